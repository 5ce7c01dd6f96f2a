//! pageturn: the reading core of a feed reader.
//!
//! Opens one entry at a time, renders it as a self-contained HTML
//! document, pages through its siblings within a browsing scope and
//! swaps between the feed abstract and a fetched full text.

pub mod config;
pub mod content;
pub mod drawer;
pub mod enclosure;
pub mod mobilizer;
pub mod reader;
pub mod render;
pub mod storage;
pub mod theme;
pub mod util;
