//! Normalized application model
//!
//! Every supported application flavour is resolved into one
//! `ApplicationModel`. The flavour-specific data lives in `VariantDetail`, so
//! downstream components match on it exhaustively instead of re-reading
//! apiVersion strings.

use crate::constants::{
    ACM_APP_API_GROUP, APPSET_API_GROUP, ARGO_API_GROUP, FLUX_HINT, OCP_HINT,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identity of a displayed application
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppKey {
    pub namespace: String,
    pub name: String,
    pub api_group: ApiGroupHint,
}

/// Application flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppVariant {
    Subscription,
    Argo,
    ApplicationSetPush,
    ApplicationSetPull,
    SyntheticOcp,
    SyntheticFlux,
}

impl AppVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppVariant::Subscription => "Subscription",
            AppVariant::Argo => "Argo",
            AppVariant::ApplicationSetPush => "ApplicationSetPush",
            AppVariant::ApplicationSetPull => "ApplicationSetPull",
            AppVariant::SyntheticOcp => "SyntheticOCP",
            AppVariant::SyntheticFlux => "SyntheticFlux",
        }
    }

    pub fn is_argo_family(&self) -> bool {
        matches!(
            self,
            AppVariant::Argo | AppVariant::ApplicationSetPush | AppVariant::ApplicationSetPull
        )
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, AppVariant::SyntheticOcp | AppVariant::SyntheticFlux)
    }
}

impl fmt::Display for AppVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// API group hint handed to the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApiGroupHint {
    Acm,
    ApplicationSet,
    Argo,
    Ocp,
    Flux,
}

impl ApiGroupHint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiGroupHint::Acm => ACM_APP_API_GROUP,
            ApiGroupHint::ApplicationSet => APPSET_API_GROUP,
            ApiGroupHint::Argo => ARGO_API_GROUP,
            ApiGroupHint::Ocp => OCP_HINT,
            ApiGroupHint::Flux => FLUX_HINT,
        }
    }

    /// Missing hints default to the ACM application group
    pub fn from_optional(hint: Option<&str>) -> Result<Self, String> {
        match hint {
            None => Ok(ApiGroupHint::Acm),
            Some(h) if h.is_empty() => Ok(ApiGroupHint::Acm),
            Some(h) => h.parse(),
        }
    }
}

impl fmt::Display for ApiGroupHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ApiGroupHint {
    type Err = String;

    /// Accepts either `<kind>.<group>` or a bare group
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            ACM_APP_API_GROUP | "app.k8s.io" => Ok(ApiGroupHint::Acm),
            APPSET_API_GROUP => Ok(ApiGroupHint::ApplicationSet),
            ARGO_API_GROUP | "argoproj.io" => Ok(ApiGroupHint::Argo),
            OCP_HINT => Ok(ApiGroupHint::Ocp),
            FLUX_HINT => Ok(ApiGroupHint::Flux),
            _ => Err(format!("Unknown application API group: {}", s)),
        }
    }
}

/// Weak reference to a placement-like resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRef {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

/// One subscription of a subscription-model application, with its relations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionModel {
    pub resource: Value,
    pub report: Option<Value>,
    pub channel: Option<Value>,
    pub decisions: Vec<Value>,
    pub placements: Vec<Value>,
    pub prehooks: Vec<Value>,
    pub posthooks: Vec<Value>,
}

/// Data specific to subscription-model applications
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionApp {
    /// Channel identifiers offered for selection
    pub channels: Vec<String>,
    pub active_channel: Option<String>,
    /// Subscriptions shown for the active channel
    pub subscriptions: Vec<SubscriptionModel>,
    pub all_subscriptions: Vec<Value>,
    pub all_channels: Vec<Value>,
}

/// Data specific to Argo applications
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgoApp {
    /// Managed cluster hosting the Argo application resource
    pub cluster: String,
}

/// Cluster targeted by an ApplicationSet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSetCluster {
    pub name: String,
    pub url: Option<String>,
    pub status: String,
}

/// Data specific to ApplicationSets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSetApp {
    pub pull_model: bool,
    /// Generated Argo applications; synthesized from the report in pull mode
    pub apps: Vec<Value>,
    pub clusters: Vec<AppSetCluster>,
    pub placement: Option<Value>,
    /// False when the generator names a placement that does not exist
    pub placement_found: bool,
}

/// Synthetic application flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntheticKind {
    Ocp,
    Flux,
}

impl SyntheticKind {
    pub fn kind(&self) -> &'static str {
        match self {
            SyntheticKind::Ocp => "OCPApplication",
            SyntheticKind::Flux => "FluxApplication",
        }
    }

    pub fn node_type(&self) -> &'static str {
        match self {
            SyntheticKind::Ocp => "ocpapplication",
            SyntheticKind::Flux => "fluxapplication",
        }
    }

    /// Label selector used to find resources belonging to the application
    pub fn label_selector(&self, name: &str) -> String {
        match self {
            SyntheticKind::Ocp => format!("app={0},app.kubernetes.io/part-of={0}", name),
            SyntheticKind::Flux => format!(
                "kustomize.toolkit.fluxcd.io/name={0},helm.toolkit.fluxcd.io/name={0}",
                name
            ),
        }
    }
}

/// Flavour-specific part of an application model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VariantDetail {
    Subscription(SubscriptionApp),
    Argo(ArgoApp),
    ApplicationSet(AppSetApp),
    Synthetic(SyntheticKind),
}

/// Normalized view of one application resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationModel {
    pub name: String,
    pub namespace: String,
    /// Raw resource used as ground truth
    pub source_resource: Value,
    pub related_placement: Option<PlacementRef>,
    pub placement_decision: Option<Value>,
    /// Target clusters; empty while undetermined
    pub cluster_list: Vec<String>,
    /// Cluster the application was resolved on, when not the hub
    pub cluster: Option<String>,
    pub detail: VariantDetail,
}

impl ApplicationModel {
    pub fn variant(&self) -> AppVariant {
        match &self.detail {
            VariantDetail::Subscription(_) => AppVariant::Subscription,
            VariantDetail::Argo(_) => AppVariant::Argo,
            VariantDetail::ApplicationSet(appset) if appset.pull_model => {
                AppVariant::ApplicationSetPull
            }
            VariantDetail::ApplicationSet(_) => AppVariant::ApplicationSetPush,
            VariantDetail::Synthetic(SyntheticKind::Ocp) => AppVariant::SyntheticOcp,
            VariantDetail::Synthetic(SyntheticKind::Flux) => AppVariant::SyntheticFlux,
        }
    }

    pub fn kind(&self) -> &str {
        self.source_resource
            .get("kind")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }

    pub fn api_version(&self) -> &str {
        self.source_resource
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }

    /// Active channel for subscription applications
    pub fn active_channel(&self) -> Option<&str> {
        match &self.detail {
            VariantDetail::Subscription(sub) => sub.active_channel.as_deref(),
            _ => None,
        }
    }
}
