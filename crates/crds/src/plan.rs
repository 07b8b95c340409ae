//! TerraformPlan CRD
//!
//! Controller-derived execution intent. The plan controller materializes a
//! pod plus a config map per spec revision and harvests the terraform logs
//! back into the plan status.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::template::PodTemplate;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "terraform.tfops.io",
    version = "v1alpha1",
    kind = "TerraformPlan",
    namespaced,
    status = "TerraformPlanStatus",
    shortname = "tfplan",
    printcolumn = r#"{"name":"Approved","type":"boolean","jsonPath":".spec.approved"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TerraformPlanSpec {
    /// Indicates if the plan is approved to apply
    #[serde(default)]
    pub approved: bool,

    /// Whole terraform configuration definition, dumped to main.tf
    pub configuration: String,

    /// Variable values, dumped to terraform.tfvars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,

    /// Shapes the pod that will run terraform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TerraformPlanStatus {
    /// Current phase of the terraform action
    #[serde(default)]
    pub phase: Phase,

    /// Captured stdout of the terraform container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<String>,

    /// Base64 encoded contents of `terraform plan -out`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_plan: Option<String>,

    /// Fingerprint of the spec the current pod revision was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_hash: Option<String>,
}
