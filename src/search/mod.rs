//! Search index collaborator
//!
//! The status planner speaks to the search index through the `SearchClient`
//! trait. Two implementations are provided: a GraphQL client for a live
//! search service and an in-memory index used offline and in tests.

mod client;
mod http;
mod index;
mod query;

pub use client::SearchClient;
pub use http::HttpSearchClient;
pub use index::InMemorySearchIndex;
pub use query::{
    RelatedGroup, ResourceStatusQuery, SearchFilter, SearchInput, SearchResult,
    convert_string_to_query,
};
