//! Search index query and result types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single property filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFilter {
    pub property: String,
    pub values: Vec<String>,
}

impl SearchFilter {
    pub fn new(property: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            property: property.into(),
            values,
        }
    }

    pub fn single(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, vec![value.into()])
    }
}

/// Wire-level search request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchInput {
    pub keywords: Vec<String>,
    pub filters: Vec<SearchFilter>,
    pub related_kinds: Vec<String>,
}

impl SearchInput {
    pub fn filter_values(&self, property: &str) -> Option<&[String]> {
        self.filters
            .iter()
            .find(|f| f.property == property)
            .map(|f| f.values.as_slice())
    }
}

/// Items of one related kind
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelatedGroup {
    pub kind: String,
    pub items: Vec<Value>,
}

/// Wire-level search response for one request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    pub items: Vec<Value>,
    pub related: Option<Vec<RelatedGroup>>,
}

impl SearchResult {
    /// Related items of a kind, matched case-insensitively
    pub fn related_of(&self, kind: &str) -> Vec<&Value> {
        self.related
            .iter()
            .flatten()
            .filter(|group| group.kind.eq_ignore_ascii_case(kind))
            .flat_map(|group| group.items.iter())
            .collect()
    }

    pub fn related_groups(&self) -> &[RelatedGroup] {
        self.related.as_deref().unwrap_or(&[])
    }
}

/// Status lookup as planned against the application graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceStatusQuery {
    pub kinds: Vec<String>,
    pub name: Option<String>,
    pub namespaces: Vec<String>,
    pub cluster: Option<String>,
    /// Extra property filters such as labels or Argo source fields
    pub filters: Vec<SearchFilter>,
    pub related_kinds: Vec<String>,
}

impl ResourceStatusQuery {
    pub fn for_kinds(kinds: Vec<String>) -> Self {
        Self {
            kinds,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_cluster(mut self, cluster: Option<String>) -> Self {
        self.cluster = cluster.filter(|c| !c.is_empty());
        self
    }

    pub fn with_filter(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_related_kinds(mut self, related_kinds: Vec<String>) -> Self {
        self.related_kinds = related_kinds;
        self
    }

    /// Lower into the search index wire format
    pub fn to_search_input(&self) -> SearchInput {
        let mut filters = Vec::new();
        if !self.kinds.is_empty() {
            filters.push(SearchFilter::new("kind", self.kinds.clone()));
        }
        if let Some(name) = &self.name {
            filters.push(SearchFilter::single("name", name.clone()));
        }
        if !self.namespaces.is_empty() {
            filters.push(SearchFilter::new("namespace", self.namespaces.clone()));
        }
        if let Some(cluster) = &self.cluster {
            filters.push(SearchFilter::new("cluster", split_values(cluster)));
        }
        filters.extend(self.filters.iter().cloned());

        SearchInput {
            keywords: Vec::new(),
            filters,
            related_kinds: self.related_kinds.clone(),
        }
    }
}

/// Parse a textual query (`kind:pod namespace:a,b label:x=y`) into a search input
pub fn convert_string_to_query(text: &str) -> SearchInput {
    let mut input = SearchInput::default();
    for token in text.split_whitespace() {
        match token.split_once(':') {
            Some((property, values)) if !property.is_empty() && !values.is_empty() => {
                input
                    .filters
                    .push(SearchFilter::new(property, split_values(values)));
            }
            _ => input.keywords.push(token.to_string()),
        }
    }
    input
}

fn split_values(values: &str) -> Vec<String> {
    values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}
