//! TerraformState CRD
//!
//! Persisted terraform state document. Seeded once by the configuration
//! controller, then mutated exclusively through the HTTP backend sidecar
//! while the pushing terraform process holds the lock.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "terraform.tfops.io",
    version = "v1alpha1",
    kind = "TerraformState",
    namespaced,
    status = "TerraformStateStatus",
    shortname = "tfstate"
)]
#[serde(rename_all = "camelCase")]
pub struct TerraformStateSpec {
    /// Terraform state JSON document, passed through byte-for-byte
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TerraformStateStatus {
    /// Lock ID currently holding this state, empty when unlocked
    #[serde(default, rename = "lockID")]
    pub lock_id: String,

    /// Time since when the lock is held
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_since: Option<DateTime<Utc>>,
}
