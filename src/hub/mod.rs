//! Session-aware client for the Koji hub.

pub mod client;
pub mod listing;
pub mod model;

pub use client::{HubClient, HubError, TaskQuery, DEFAULT_USER_AGENT};
pub use listing::fault_rejects_query_opts;
pub use model::{build_info_url, Build, Task, TaskStateFilter};
