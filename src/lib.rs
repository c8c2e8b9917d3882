//! Koji Scope - Session-aware Koji hub client
//!
//! This crate implements a small client for Koji build hubs: an XML-RPC
//! session client with cookie tracking and TLS client-certificate login,
//! build and task listings that tolerate hub version skew, and task log
//! retrieval from the hub's file server.

pub mod config;
pub mod hub;
pub mod logs;
pub mod tls;
pub mod transport;

pub use config::{ConfigError, ScopeConfig};
pub use hub::{Build, HubClient, HubError, Task, TaskQuery, TaskStateFilter};
pub use logs::{fetch_task_log, task_log_url, task_logs_base_url, COMMON_TASK_LOG_FILES};
pub use tls::{load_tls_material, TlsError, TlsFileConfig, TlsMaterial};
pub use transport::{HttpTransport, MockTransport, Transport, TransportConfig, TransportError};
