//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned and exposed to handlers)
//!     → handlers.rs (path parsing, aggregation call)
//!     → error.rs (problem-detail rendering on failure)
//!     → Send to client
//! ```

pub mod error;
pub mod handlers;
pub mod request;
pub mod server;

pub use error::{ApiError, ErrorCode, ProblemDetail};
pub use request::{RequestId, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
