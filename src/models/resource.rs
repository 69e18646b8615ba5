//! Helpers for navigating raw Kubernetes resources held as JSON values
//!
//! Resources coming from the cache, the search index or a remote view are
//! kept as `serde_json::Value` and read through these accessors.

use serde_json::Value;
use std::collections::BTreeMap;

/// Follow a path of object keys
pub fn value_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(*key))
}

/// Follow a path of object keys and read a string
pub fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(value, path).and_then(|v| v.as_str())
}

/// Follow a path of object keys and read an array, empty when absent
pub fn array_at<'a>(value: &'a Value, path: &[&str]) -> &'a [Value] {
    value_at(value, path)
        .and_then(|v| v.as_array())
        .map(|a| a.as_slice())
        .unwrap_or(&[])
}

/// Follow a path of object keys and read a number, accepting numeric strings
pub fn u64_at(value: &Value, path: &[&str]) -> Option<u64> {
    value_at(value, path).and_then(as_count)
}

/// Read a count that search may report either as a number or as a string
pub fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn name_of(resource: &Value) -> &str {
    str_at(resource, &["metadata", "name"])
        .or_else(|| str_at(resource, &["name"]))
        .unwrap_or("")
}

pub fn namespace_of(resource: &Value) -> &str {
    str_at(resource, &["metadata", "namespace"])
        .or_else(|| str_at(resource, &["namespace"]))
        .unwrap_or("")
}

pub fn kind_of(resource: &Value) -> &str {
    str_at(resource, &["kind"]).unwrap_or("")
}

pub fn api_version_of(resource: &Value) -> &str {
    str_at(resource, &["apiVersion"]).unwrap_or("")
}

pub fn annotation<'a>(resource: &'a Value, key: &str) -> Option<&'a str> {
    value_at(resource, &["metadata", "annotations", key]).and_then(|v| v.as_str())
}

pub fn label<'a>(resource: &'a Value, key: &str) -> Option<&'a str> {
    value_at(resource, &["metadata", "labels", key]).and_then(|v| v.as_str())
}

/// True when the resource has the given namespace and name
pub fn matches_ns_name(resource: &Value, namespace: &str, name: &str) -> bool {
    namespace_of(resource) == namespace && name_of(resource) == name
}

/// Split an "ns/name" reference
pub fn split_ns_name(reference: &str) -> Option<(&str, &str)> {
    let (namespace, name) = reference.trim().split_once('/')?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some((namespace, name))
}

/// Parse a search item label string (`"a=b; c=d"`) into a map
pub fn parse_label_string(labels: &str) -> BTreeMap<String, String> {
    labels
        .split(';')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Read a label from a search item's flattened label string
pub fn search_label(item: &Value, key: &str) -> Option<String> {
    let labels = str_at(item, &["label"])?;
    parse_label_string(labels).remove(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_navigation() {
        let resource = json!({
            "metadata": {"name": "app", "namespace": "ns", "annotations": {"a/b": "c"}},
            "spec": {"replicas": 3, "items": [1, 2]},
            "status": {"desired": "2"}
        });
        assert_eq!(name_of(&resource), "app");
        assert_eq!(namespace_of(&resource), "ns");
        assert_eq!(annotation(&resource, "a/b"), Some("c"));
        assert_eq!(u64_at(&resource, &["spec", "replicas"]), Some(3));
        assert_eq!(u64_at(&resource, &["status", "desired"]), Some(2));
        assert_eq!(array_at(&resource, &["spec", "items"]).len(), 2);
        assert!(array_at(&resource, &["spec", "missing"]).is_empty());
    }

    #[test]
    fn test_search_item_fields() {
        let item = json!({"name": "pod-1", "namespace": "default", "label": "app=web; pod-template-hash=abc"});
        assert_eq!(name_of(&item), "pod-1");
        assert_eq!(search_label(&item, "pod-template-hash").as_deref(), Some("abc"));
        assert_eq!(search_label(&item, "missing"), None);
    }

    #[test]
    fn test_split_ns_name() {
        assert_eq!(split_ns_name("ns/sub"), Some(("ns", "sub")));
        assert_eq!(split_ns_name("nonamespace"), None);
        assert_eq!(split_ns_name("/x"), None);
    }
}
