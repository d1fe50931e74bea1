//! Ambient HTTP middleware.
//!
//! Request logging with latency tracking, applied to every route the
//! binary serves.

pub mod logging;

pub use logging::{request_logging, request_logging_simple};
