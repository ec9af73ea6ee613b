//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use media_config_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (SonarrConfig, ProwlarrConfig, etc.)
//! - Adapter traits and the change model
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Config types

// CRD types - most commonly used
pub use crate::crd::*;

// Adapter traits - needed for implementing new service adapters
pub use crate::adapter::{
    Adapter, AdapterError, AdapterRegistry, ApplyResult, Change, ChangeSet, DesiredState,
    DirectApply, HealthCheck,
};

// Compilation
pub use crate::compiler::{CompileError, Compiler, DefaultCompiler};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError, TriggerSource};

// Registration
pub use crate::controller::registration::{RegistrationCoordinator, RegistrationError};

// Config types
pub use crate::config::ControllerConfig;
