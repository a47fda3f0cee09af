//! # greview Node
//!
//! HTTP server that turns git pushes into code reviews.
//!
//! A client pushes two branches, `source` and `destination`, to the node's
//! smart HTTP endpoint:
//!
//! ```bash
//! git push http://localhost:8080/ feature:refs/heads/source main:refs/heads/destination
//! ```
//!
//! The node stores both under a hidden per-review prefix in its bare
//! repository, records a review, and answers with a link to it.
//!
//! ## Modules
//!
//! - [`api`] - Git smart HTTP endpoints and the review API
//! - [`config`] - Node configuration management
//! - [`observability`] - Structured logging and request tracing

pub mod api;
pub mod config;
pub mod observability;

pub use api::{create_router, ApiError, AppState, Engine};
pub use config::{ConfigError, NodeConfig};
