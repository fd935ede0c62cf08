//! Client for the Venddy data API: vendor search and taxonomy tables.

pub mod client;
pub mod error;
pub mod search;
pub mod taxonomy;
pub mod types;
