//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, `access` target for access records)
//!     → metrics.rs (cache counters, mounted-route gauge)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields, never preformatted strings
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
