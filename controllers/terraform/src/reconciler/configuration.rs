//! TerraformConfiguration reconciler
//!
//! Ensures each configuration owns exactly one TerraformState (seeded with a
//! fresh lineage) and one TerraformPlan kept in sync with the configuration
//! spec. Deletion is guarded by a finalizer; dependents disappear through the
//! owner-reference cascade.

use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::finalizer::{finalizer, Event as FinalizerEvent};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crds::{
    Phase, TerraformConfiguration, TerraformConfigurationSpec, TerraformPlan, TerraformPlanSpec,
    TerraformState, TerraformStateSpec,
};

use super::{phase_patch, Reconciler, SYNC_PERIOD};
use crate::error::ControllerError;
use crate::reconcile_helpers::is_conflict;

pub(crate) const CONFIGURATION_FINALIZER: &str = "configuration.finalizers.terraform.tfops.io";

pub async fn reconcile_configuration(
    config: Arc<TerraformConfiguration>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ControllerError> {
    let api = ctx.configurations.clone();

    finalizer(&api, CONFIGURATION_FINALIZER, config, |event| {
        let ctx = ctx.clone();
        async move {
            match event {
                FinalizerEvent::Apply(config) => ctx.apply_configuration(&config).await,
                FinalizerEvent::Cleanup(config) => ctx.cleanup_configuration(&config).await,
            }
        }
    })
    .await
    .map_err(|err| ControllerError::Finalizer(err.to_string()))
}

impl Reconciler {
    async fn apply_configuration(
        &self,
        config: &TerraformConfiguration,
    ) -> Result<Action, ControllerError> {
        let namespace = config
            .namespace()
            .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
        let name = config.name_any();

        info!("reconciling TerraformConfiguration {}/{}", namespace, name);

        if config.spec.paused {
            info!("TerraformConfiguration {}/{} is paused", namespace, name);
            return Ok(Action::await_change());
        }

        if config.status.is_none() {
            self.configurations
                .patch_status(
                    &name,
                    &PatchParams::default(),
                    &Patch::Merge(&phase_patch(Phase::PlanScheduled)),
                )
                .await?;
        }

        let owner = config
            .controller_owner_ref(&())
            .ok_or(ControllerError::MissingObjectKey("metadata.name"))?;

        if self.states.get_opt(&name).await?.is_none() {
            let state = generate_state(config, owner.clone());
            info!("seeding TerraformState {}/{}", namespace, name);
            match self.states.create(&PostParams::default(), &state).await {
                Ok(_) => {}
                Err(err) if is_conflict(&err) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let desired_spec = derive_plan_spec(&config.spec);
        let plan = match self.plans.get_opt(&name).await? {
            None => {
                let plan = generate_plan(config, desired_spec, owner);
                info!("creating TerraformPlan {}/{}", namespace, name);
                let created = match self.plans.create(&PostParams::default(), &plan).await {
                    Ok(created) => created,
                    Err(err) if is_conflict(&err) => self.plans.get(&name).await?,
                    Err(err) => return Err(err.into()),
                };
                self.plans
                    .patch_status(
                        &name,
                        &PatchParams::default(),
                        &Patch::Merge(&phase_patch(Phase::PlanScheduled)),
                    )
                    .await?;
                created
            }
            Some(mut existing) => {
                if existing.spec != desired_spec {
                    info!("TerraformPlan {}/{} drifted, overwriting spec", namespace, name);
                    // Replace, not merge: dropped optional fields and emptied
                    // arrays must clear on the stored plan as well.
                    existing.spec = desired_spec;
                    self.plans
                        .replace(&name, &PostParams::default(), &existing)
                        .await?
                } else {
                    debug!("TerraformPlan {}/{} already up to date", namespace, name);
                    existing
                }
            }
        };

        // The configuration phase is observational, it follows the plan.
        let plan_phase = plan.status.as_ref().map(|s| s.phase).unwrap_or_default();
        let config_phase = config.status.as_ref().map(|s| s.phase).unwrap_or_default();
        if plan_phase != config_phase {
            self.configurations
                .patch_status(
                    &name,
                    &PatchParams::default(),
                    &Patch::Merge(&phase_patch(plan_phase)),
                )
                .await?;
        }

        Ok(Action::requeue(SYNC_PERIOD))
    }

    async fn cleanup_configuration(
        &self,
        config: &TerraformConfiguration,
    ) -> Result<Action, ControllerError> {
        // Owned plans, states, pods and config maps are removed by the
        // cluster garbage collector through the owner references.
        info!(
            "TerraformConfiguration {}/{} deleted, dependents cascade",
            config.namespace().unwrap_or_default(),
            config.name_any()
        );
        Ok(Action::await_change())
    }
}

/// Initial terraform state document with a fresh lineage.
pub(crate) fn initial_state_document(lineage: &str) -> serde_json::Value {
    json!({ "version": 4, "serial": 1, "lineage": lineage })
}

fn generate_state(config: &TerraformConfiguration, owner: OwnerReference) -> TerraformState {
    let lineage = Uuid::new_v4().to_string();

    TerraformState {
        metadata: ObjectMeta {
            name: config.metadata.name.clone(),
            namespace: config.namespace(),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        spec: TerraformStateSpec {
            state: Some(initial_state_document(&lineage)),
        },
        status: None,
    }
}

/// Plan spec derived from a configuration spec.
pub(crate) fn derive_plan_spec(spec: &TerraformConfigurationSpec) -> TerraformPlanSpec {
    TerraformPlanSpec {
        approved: spec.auto_approve,
        configuration: spec.configuration.clone(),
        values: spec.values.clone(),
        template: spec.template.clone(),
    }
}

fn generate_plan(
    config: &TerraformConfiguration,
    spec: TerraformPlanSpec,
    owner: OwnerReference,
) -> TerraformPlan {
    TerraformPlan {
        metadata: ObjectMeta {
            name: config.metadata.name.clone(),
            namespace: config.namespace(),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        spec,
        status: None,
    }
}
