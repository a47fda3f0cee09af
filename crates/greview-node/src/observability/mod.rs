//! # Observability Module
//!
//! - **Structured Logging**: pretty or JSON logs filtered by level
//! - **Request Tracing**: request ID propagation across all operations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use axum::{middleware, Router};
//! use greview_node::observability::{init_logging, request_id_middleware, LogFormat};
//!
//! init_logging("info", LogFormat::Pretty);
//!
//! let app: Router<()> = Router::new().layer(middleware::from_fn(request_id_middleware));
//! ```

mod logging;
pub mod middleware;

pub use logging::{default_filter, init_logging, LogFormat};
pub use middleware::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
