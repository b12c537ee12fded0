//! Source adapters producing normalized [`Profile`](crate::types::Profile)
//! records.
//!
//! Two sources feed the pipelines:
//!
//! * [`registry`]: paginated fetch from the company registry, with
//!   filtering, address/name normalization, and industry label resolution.
//! * [`roster`]: a fixed local JSON document of investors, mapped verbatim.

pub mod registry;
pub mod roster;

pub use registry::RegistryClient;
pub use roster::load_investors;
