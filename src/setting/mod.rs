//! Setting model and configuration merge.
//!
//! # Data Flow
//! ```text
//! Route pipeline (per FlatNode):
//!     RouterSetting::new(identity)          seed, default path if empty
//!     → server RouterOptions                 registration order
//!     → merge_router_config(router_config)   configuration order
//!     → off / proxy / plugins / cache / access
//!
//! Service pipeline (per registered service):
//!     ServiceSetting::new(methods)           HTTP on, WebSocket off
//!     → server ServiceOptions → handler ServiceOptions
//!     → merge_service_config(service_config)
//!     → per-method HTTP / WebSocket endpoints
//! ```
//!
//! # Design Decisions
//! - Options are plain closures folded left to right
//! - Declarative optional flags are `Option<bool>`: `None` never overrides
//! - Zero cache and empty plugin lists never override

pub mod path;
pub mod router;
pub mod service;

pub use path::default_path;
pub use router::{merge_router_config, router_option, RouterOption, RouterSetting};
pub use service::{merge_service_config, service_option, MethodSetting, ServiceOption, ServiceSetting};
