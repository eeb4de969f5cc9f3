//! Collaborator interfaces for the Sink redirect core.
//!
//! The redirect service reads link records from a key-value store and hands
//! access events to an analytics sink. Both backends are deployment-specific,
//! so this crate only carries the interface surface the core consumes plus
//! in-memory implementations for local runs and tests.

pub mod analytics;
pub mod store;
pub mod types;

pub use analytics::{AccessEvent, AnalyticsSink};
pub use store::{LinkStore, MemoryStore, StoreError};
pub use types::{Link, link_key, views_key};
