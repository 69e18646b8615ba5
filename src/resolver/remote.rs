//! Remote resource-view seam
//!
//! Retrieves a single resource that lives on a managed cluster rather than
//! on the hub. The kube-backed implementation lives in `crate::kube::view`.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Identifies the resource to fetch from a managed cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteResourceRef<'a> {
    pub cluster: &'a str,
    pub kind: &'a str,
    pub api_version: &'a str,
    pub name: &'a str,
    pub namespace: &'a str,
}

#[async_trait]
pub trait RemoteResourceFetcher: Send + Sync {
    /// Fetch the resource, or `None` when the cluster has no such resource
    async fn fetch(&self, target: &RemoteResourceRef<'_>) -> Result<Option<Value>>;

    fn fetcher_type(&self) -> &'static str;
}
