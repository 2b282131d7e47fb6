//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relays and server produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID (x-request-id) flows to the upstream
//! - Logging is the only diagnostic side channel; it never alters relay behavior

pub mod logging;
pub mod metrics;
