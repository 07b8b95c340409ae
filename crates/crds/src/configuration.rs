//! TerraformConfiguration CRD
//!
//! User-authored top-level resource describing desired infrastructure.
//! The configuration controller derives one TerraformPlan and seeds one
//! TerraformState per configuration.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::template::PodTemplate;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "terraform.tfops.io",
    version = "v1alpha1",
    kind = "TerraformConfiguration",
    namespaced,
    status = "TerraformConfigurationStatus",
    shortname = "tfconfig",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TerraformConfigurationSpec {
    /// Whole terraform configuration definition, dumped to main.tf
    pub configuration: String,

    /// Variable values, dumped to terraform.tfvars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,

    /// Indicates that reconciliation of this configuration is paused
    #[serde(default)]
    pub paused: bool,

    /// Indicates that `terraform apply` should happen without any further question
    #[serde(default)]
    pub auto_approve: bool,

    /// Shapes the pod that will run terraform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TerraformConfigurationStatus {
    /// Current phase of the terraform action, mirrored from the owned plan
    #[serde(default)]
    pub phase: Phase,
}
