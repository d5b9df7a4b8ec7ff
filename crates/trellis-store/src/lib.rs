//! Cypher-over-HTTP graph store

pub mod client;
pub mod cypher;


pub use client::{HttpGraphStore, QueryResult, http_base_url};
pub use cypher::Statement;
