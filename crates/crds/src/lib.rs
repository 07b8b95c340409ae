//! TFOps CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the TFOps controllers:
//! - TerraformConfiguration: user-authored description of desired infrastructure
//! - TerraformPlan: controller-derived execution intent, owns the terraform pod
//! - TerraformState: persisted terraform state, mediated by the HTTP backend

pub mod configuration;
pub mod phase;
pub mod plan;
pub mod state;
pub mod template;

// Re-exports
pub use configuration::*;
pub use phase::*;
pub use plan::*;
pub use state::*;
pub use template::*;

/// API group of all TFOps resources.
pub const API_GROUP: &str = "terraform.tfops.io";

/// API version of all TFOps resources.
pub const API_VERSION: &str = "terraform.tfops.io/v1alpha1";
