//! Related resources carried from one refresh to the next
//!
//! The raw search payload of the previous status pass, indexed so the
//! builder can size replica chains and attach Argo destinations without
//! querying again.

use crate::models::resource::{name_of, namespace_of};
use crate::search::{RelatedGroup, SearchResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Search data for one deployed resource
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelatedEntry {
    /// The matched search item
    pub template: Option<Value>,
    pub related: Vec<RelatedGroup>,
}

impl RelatedEntry {
    /// First related group of any of the given kinds (case-insensitive)
    pub fn group(&self, kinds: &[&str]) -> Option<&RelatedGroup> {
        self.related.iter().find(|group| {
            kinds.iter().any(|kind| group.kind.eq_ignore_ascii_case(kind)) && !group.items.is_empty()
        })
    }

    pub fn has_kind(&self, kinds: &[&str]) -> bool {
        self.group(kinds).is_some()
    }
}

/// Argo destinations discovered through sibling applications
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgoTargets {
    pub related_apps: Vec<Value>,
    /// Unique destination clusters
    pub cluster_names: Vec<String>,
    pub target_namespaces: BTreeMap<String, Vec<String>>,
    /// Namespaces resources are expected in, across all clusters
    pub namespaces: Vec<String>,
}

/// Search data keyed by `<name>-<namespace>`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedResources {
    pub entries: BTreeMap<String, RelatedEntry>,
    pub argo: Option<ArgoTargets>,
    /// Items found by label for applications without a backing resource
    pub labelled_items: Vec<Value>,
}

impl RelatedResources {
    pub fn key(name: &str, namespace: &str) -> String {
        format!("{}-{}", name, namespace)
    }

    pub fn get(&self, name: &str, namespace: &str) -> Option<&RelatedEntry> {
        self.entries.get(&Self::key(name, namespace))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.argo.is_none() && self.labelled_items.is_empty()
    }

    /// Index every item (matched or related) of the given results.
    /// Each entry carries the related groups of the result it came from.
    pub fn index_results(&mut self, results: &[SearchResult]) {
        for result in results {
            let groups = result.related_groups();
            let items = result
                .items
                .iter()
                .chain(groups.iter().flat_map(|group| group.items.iter()));
            for item in items {
                let key = Self::key(name_of(item), namespace_of(item));
                self.entries.entry(key).or_insert_with(|| RelatedEntry {
                    template: Some(item.clone()),
                    related: groups.to_vec(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_index_results_first_item_wins() {
        let results = vec![SearchResult {
            items: vec![json!({"kind": "Subscription", "name": "sub", "namespace": "ns"})],
            related: Some(vec![RelatedGroup {
                kind: "deployment".into(),
                items: vec![
                    json!({"kind": "Deployment", "name": "web", "namespace": "app", "desired": 3}),
                    json!({"kind": "Deployment", "name": "web", "namespace": "app", "desired": 1}),
                ],
            }]),
        }];
        let mut related = RelatedResources::default();
        related.index_results(&results);

        let entry = related.get("web", "app").unwrap();
        assert_eq!(entry.template.as_ref().unwrap()["desired"], 3);
        assert!(entry.has_kind(&["Deployment"]));
        assert!(!entry.has_kind(&["replicaset"]));
        assert!(related.get("sub", "ns").is_some());
    }
}
