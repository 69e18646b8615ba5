//! In-memory search index
//!
//! Evaluates search inputs over a fixed list of flattened search items. Used
//! by the offline `show` command and by tests.

use super::client::SearchClient;
use super::query::{RelatedGroup, SearchFilter, SearchInput, SearchResult};
use crate::models::resource::{name_of, namespace_of, parse_label_string, str_at};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;

/// Search index over a fixed item list
#[derive(Debug, Clone, Default)]
pub struct InMemorySearchIndex {
    items: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexFile {
    Wrapped { items: Vec<Value> },
    List(Vec<Value>),
}

impl InMemorySearchIndex {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }

    /// Load items from a YAML or JSON file, either a list or `{items: [...]}`
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read search data: {}", path.display()))?;
        let file: IndexFile = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse search data: {}", path.display()))?;
        let items = match file {
            IndexFile::Wrapped { items } | IndexFile::List(items) => items,
        };
        Ok(Self::new(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Evaluate a single input
    pub fn evaluate(&self, input: &SearchInput, limit: usize) -> SearchResult {
        let matched: Vec<&Value> = self
            .items
            .iter()
            .filter(|item| matches_input(item, input))
            .collect();

        let related = if input.related_kinds.is_empty() {
            None
        } else {
            let groups: Vec<RelatedGroup> = input
                .related_kinds
                .iter()
                .filter_map(|kind| {
                    let items = self.related_items(&matched, kind);
                    (!items.is_empty()).then(|| RelatedGroup {
                        kind: kind.to_lowercase(),
                        items,
                    })
                })
                .collect();
            Some(groups)
        };

        SearchResult {
            items: matched.into_iter().take(limit).cloned().collect(),
            related,
        }
    }

    fn related_items(&self, matched: &[&Value], kind: &str) -> Vec<Value> {
        if kind.eq_ignore_ascii_case("cluster") {
            let clusters: BTreeSet<&str> = matched
                .iter()
                .filter_map(|item| str_at(item, &["cluster"]))
                .collect();
            return self
                .items
                .iter()
                .filter(|item| is_kind(item, "cluster") && clusters.contains(name_of(item)))
                .cloned()
                .collect();
        }

        let scopes: BTreeSet<(&str, &str)> = matched
            .iter()
            .filter(|item| !namespace_of(item).is_empty())
            .map(|item| (str_at(item, &["cluster"]).unwrap_or(""), namespace_of(item)))
            .collect();
        let hosts: BTreeSet<String> = matched
            .iter()
            .map(|item| format!("{}/{}", namespace_of(item), name_of(item)))
            .collect();

        self.items
            .iter()
            .filter(|item| is_kind(item, kind))
            .filter(|item| {
                let scope = (str_at(item, &["cluster"]).unwrap_or(""), namespace_of(item));
                scopes.contains(&scope)
                    || str_at(item, &["_hostingSubscription"])
                        .is_some_and(|host| hosts.contains(host))
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SearchClient for InMemorySearchIndex {
    async fn search(&self, inputs: &[SearchInput], limit: usize) -> Result<Vec<SearchResult>> {
        Ok(inputs
            .iter()
            .map(|input| self.evaluate(input, limit))
            .collect())
    }

    fn client_type(&self) -> &'static str {
        "memory"
    }
}

fn is_kind(item: &Value, kind: &str) -> bool {
    str_at(item, &["kind"]).is_some_and(|k| k.eq_ignore_ascii_case(kind))
}

fn matches_input(item: &Value, input: &SearchInput) -> bool {
    input.filters.iter().all(|filter| matches_filter(item, filter))
        && input.keywords.iter().all(|keyword| matches_keyword(item, keyword))
}

fn matches_filter(item: &Value, filter: &SearchFilter) -> bool {
    if filter.values.is_empty() {
        return true;
    }
    match filter.property.as_str() {
        "kind" => filter.values.iter().any(|v| is_kind(item, v)),
        "label" => {
            let labels = parse_label_string(str_at(item, &["label"]).unwrap_or(""));
            filter.values.iter().any(|selector| {
                selector.split_once('=').is_some_and(|(key, value)| {
                    labels.get(key.trim()).map(String::as_str) == Some(unquote(value))
                })
            })
        }
        property => {
            let Some(actual) = item.get(property).and_then(scalar_text) else {
                return false;
            };
            filter.values.iter().any(|v| *v == actual)
        }
    }
}

fn matches_keyword(item: &Value, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    item.as_object().is_some_and(|fields| {
        fields
            .values()
            .filter_map(scalar_text)
            .any(|text| text.to_lowercase().contains(&keyword))
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches(|c| c == '\'' || c == '"')
}
