//! Full-text retrieval for mobilization.

pub mod jina;

pub use jina::{markdown_to_html, ContentError, FullTextFetcher, DEFAULT_BASE_URL};
