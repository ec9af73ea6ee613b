//! # Custom Resource Definitions
//!
//! Five namespaced kinds in `config.mediastack.io/v1alpha1`: one per
//! downstream media service plus the `ProwlarrConfig` aggregator.

mod common;
mod media;
mod prowlarr;
mod resource;
pub(crate) mod schema;
mod status;

pub use common::*;
pub use media::*;
pub use prowlarr::*;
pub use resource::ManagedResource;
pub use status::*;
