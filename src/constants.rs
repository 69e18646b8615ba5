//! Well-known API groups, annotations, labels and limits
//!
//! Centralizes the string constants shared by the resolver, builder, planner
//! and pulse engine so none of them sniff raw literals independently.

/// Default name of the hub cluster
pub const DEFAULT_HUB_CLUSTER: &str = "local-cluster";

/// Default refresh interval in seconds
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 15;

/// Missed resolutions absorbed before an application is reported missing
pub const DEFAULT_NOT_FOUND_GRACE_TICKS: u32 = 1;

/// Maximum number of items a single search batch may return
pub const DEFAULT_SEARCH_LIMIT: usize = 1000;

/// Resource count above which same-kind resources are grouped into one node
pub const DEFAULT_GROUP_THRESHOLD: usize = 5;

/// Kubernetes label values are limited to 63 characters
pub const MAX_LABEL_LENGTH: usize = 63;

// API groups used as resolver hints
pub const ACM_APP_API_GROUP: &str = "application.app.k8s.io";
pub const APPSET_API_GROUP: &str = "applicationset.argoproj.io";
pub const ARGO_API_GROUP: &str = "application.argoproj.io";
pub const OCP_HINT: &str = "ocp";
pub const FLUX_HINT: &str = "flux";

// Annotations
pub const SUBSCRIPTIONS_ANNOTATION: &str = "apps.open-cluster-management.io/subscriptions";
pub const HOSTING_SUBSCRIPTION_ANNOTATION: &str =
    "apps.open-cluster-management.io/hosting-subscription";
pub const GIT_PATH_ANNOTATION: &str = "apps.open-cluster-management.io/git-path";
pub const GITHUB_PATH_ANNOTATION: &str = "apps.open-cluster-management.io/github-path";
pub const BUCKET_PATH_ANNOTATION: &str = "apps.open-cluster-management.io/bucket-path";
pub const OCM_MANAGED_CLUSTER_ANNOTATION: &str =
    "apps.open-cluster-management.io/ocm-managed-cluster";

// Labels
pub const PLACEMENT_LABEL: &str = "cluster.open-cluster-management.io/placement";
pub const PLACEMENT_RULE_LABEL: &str = "cluster.open-cluster-management.io/placementrule";
pub const ACM_CLUSTER_SECRET_LABEL: &str = "apps.open-cluster-management.io/acm-cluster";

/// Aggregate channel shown when an application has more than one subscription
pub const ALL_CHANNELS: &str = "__ALL__/__ALL__//__ALL__/__ALL__";

// Argo destinations that point back at the cluster hosting Argo CD
pub const ARGO_IN_CLUSTER_SERVER: &str = "https://kubernetes.default.svc";
pub const ARGO_IN_CLUSTER_NAME: &str = "in-cluster";

/// Alternate selector that also shows every subscription
pub const ALL_SUBSCRIPTIONS: &str = "__ALL__/SUBSCRIPTIONS__";
