//! Pod-shaping template shared by TerraformConfiguration and TerraformPlan.

use k8s_openapi::api::core::v1::{EnvFromSource, EnvVar, Volume, VolumeMount};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Defines aspects of the pod that will run `terraform plan` / `terraform apply`.
///
/// All fields are standard core/v1 kubernetes API types and are appended to
/// the generated pod as-is; the controller adds its own config volume, mount
/// and automation environment on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodTemplate {
    /// List of volumes that can be mounted by containers belonging to the pod
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// List of sources to populate environment variables in the terraform container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_from: Vec<EnvFromSource>,

    /// List of environment variables to set in the terraform container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Pod volumes to mount into the terraform container's filesystem
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,

    /// Name of the ServiceAccount to use for the terraform pod
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}
