//! Reconciliation logic for the TFOps CRDs.
//!
//! Two control loops:
//! - `configuration`: TerraformConfiguration -> {TerraformPlan, TerraformState}
//! - `plan`: TerraformPlan -> {Pod, ConfigMap}
//!
//! Every reconcile is a pure function of current cluster state; progress
//! markers (phase, spec hash) live on the resources themselves.

mod configuration;
mod plan;

#[cfg(test)]
mod configuration_test;
#[cfg(test)]
mod plan_test;

use std::time::Duration;

use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use kube::{Api, Client};
use serde_json::json;

use crds::{Phase, TerraformConfiguration, TerraformPlan, TerraformState};

pub use configuration::reconcile_configuration;
pub use plan::reconcile_plan;

/// Long resync guard; change detection is event-driven through watches.
pub(crate) const SYNC_PERIOD: Duration = Duration::from_secs(600);

/// Reconciles TerraformConfiguration and TerraformPlan resources within one
/// namespace.
pub struct Reconciler {
    pub(crate) configurations: Api<TerraformConfiguration>,
    pub(crate) plans: Api<TerraformPlan>,
    pub(crate) states: Api<TerraformState>,
    pub(crate) pods: Api<Pod>,
    pub(crate) config_maps: Api<ConfigMap>,
}

impl Reconciler {
    /// Creates a reconciler with all API clients bound to `namespace`.
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            configurations: Api::namespaced(client.clone(), namespace),
            plans: Api::namespaced(client.clone(), namespace),
            states: Api::namespaced(client.clone(), namespace),
            pods: Api::namespaced(client.clone(), namespace),
            config_maps: Api::namespaced(client, namespace),
        }
    }
}

/// Status patch setting only the phase.
pub(crate) fn phase_patch(phase: Phase) -> serde_json::Value {
    json!({ "status": { "phase": phase } })
}
