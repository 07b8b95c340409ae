//! TerraformPlan reconciler
//!
//! Materializes a pod plus a config map per spec revision, harvests the
//! terraform logs once the run container terminates and garbage-collects
//! pods of stale revisions together with their paired config maps.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use serde_json::json;
use tracing::{debug, info, warn};

use crds::{Phase, TerraformPlan};

use super::{Reconciler, SYNC_PERIOD};
use crate::error::ControllerError;
use crate::reconcile_helpers::{controlled_by, hashed_name, ignore_gone, is_conflict, spec_hash};
use crate::resources::{
    generate_config_map, generate_pod, LINKED_CONFIG_MAP_ANNOTATION, PLAN_LABEL,
    TERRAFORM_CONTAINER,
};

/// What to do with a pod found under a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PodDisposition {
    /// Pod belongs to the current revision and is still progressing
    Keep,
    /// Pod belongs to a previous spec revision
    Stale,
    /// Terraform container terminated, logs are ready to harvest
    Finished { exit_code: i32 },
    /// Pod reached a terminal phase without a terminated terraform container
    Aborted,
}

pub async fn reconcile_plan(
    plan: Arc<TerraformPlan>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ControllerError> {
    ctx.apply_plan(&plan).await
}

impl Reconciler {
    async fn apply_plan(&self, plan: &TerraformPlan) -> Result<Action, ControllerError> {
        let namespace = plan
            .namespace()
            .ok_or(ControllerError::MissingObjectKey("metadata.namespace"))?;
        let name = plan.name_any();

        if plan.metadata.deletion_timestamp.is_some() {
            // dependents are garbage collected through owner references
            return Ok(Action::await_change());
        }

        let Some(status) = plan.status.as_ref() else {
            // the configuration controller initializes the status
            debug!("TerraformPlan {}/{} has no status yet, waiting", namespace, name);
            return Ok(Action::await_change());
        };

        info!("reconciling TerraformPlan {}/{}", namespace, name);

        let current_hash = spec_hash(&plan.spec)?;
        let prefix = hashed_name(&name, &current_hash);

        if status.spec_hash.as_deref() != Some(current_hash.as_str()) {
            info!(
                "TerraformPlan {}/{} spec changed, scheduling terraform run {}",
                namespace, name, prefix
            );

            let owner = plan
                .controller_owner_ref(&())
                .ok_or(ControllerError::MissingObjectKey("metadata.name"))?;

            let mut config_map = generate_config_map(plan, &current_hash);
            config_map.metadata.owner_references = Some(vec![owner.clone()]);

            let mut pod = generate_pod(plan, &current_hash);
            pod.metadata.owner_references = Some(vec![owner]);

            match self
                .config_maps
                .create(&PostParams::default(), &config_map)
                .await
            {
                Ok(_) => {}
                Err(err) if is_conflict(&err) => {}
                Err(err) => return Err(err.into()),
            }

            match self.pods.create(&PostParams::default(), &pod).await {
                Ok(_) => {}
                Err(err) if is_conflict(&err) => {}
                Err(err) => return Err(err.into()),
            }

            let running = if plan.spec.approved {
                Phase::ApplyRunning
            } else {
                Phase::PlanRunning
            };
            let patch = json!({ "status": { "specHash": current_hash, "phase": running } });
            self.plans
                .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                .await?;
        }

        // Sweep pods of this plan across all revisions.
        let selector = format!("{PLAN_LABEL}={name}");
        let pods = self
            .pods
            .list(&ListParams::default().labels(&selector))
            .await?;
        let plan_uid = plan.uid().unwrap_or_default();

        for pod in pods
            .items
            .into_iter()
            .filter(|pod| controlled_by(&pod.metadata, &plan_uid))
        {
            let pod_name = pod.name_any();
            match classify_pod(&pod, &prefix) {
                PodDisposition::Keep => {}
                PodDisposition::Finished { exit_code } => {
                    let logs = self
                        .pods
                        .logs(
                            &pod_name,
                            &LogParams {
                                container: Some(TERRAFORM_CONTAINER.to_string()),
                                ..LogParams::default()
                            },
                        )
                        .await?;

                    let phase = terminal_phase(exit_code, plan.spec.approved);
                    info!(
                        "terraform run {} for TerraformPlan {}/{} finished with exit code {}",
                        pod_name, namespace, name, exit_code
                    );

                    let patch = json!({ "status": { "phase": phase, "logs": logs } });
                    self.plans
                        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
                        .await?;

                    self.delete_run_pod(&pod).await?;
                }
                PodDisposition::Stale => {
                    debug!("deleting pod {} of a stale revision", pod_name);
                    self.delete_run_pod(&pod).await?;
                }
                PodDisposition::Aborted => {
                    warn!("deleting aborted pod {}", pod_name);
                    self.delete_run_pod(&pod).await?;
                }
            }
        }

        Ok(Action::requeue(SYNC_PERIOD))
    }

    /// Deletes a run pod together with the config map it is paired with,
    /// tolerating objects that are already gone.
    async fn delete_run_pod(&self, pod: &Pod) -> Result<(), ControllerError> {
        if let Some(config_map) = pod.annotations().get(LINKED_CONFIG_MAP_ANNOTATION) {
            ignore_gone(
                self.config_maps
                    .delete(config_map, &DeleteParams::default())
                    .await,
            )?;
        }

        ignore_gone(
            self.pods
                .delete(&pod.name_any(), &DeleteParams::default())
                .await,
        )?;
        Ok(())
    }
}

/// Classifies a pod owned by a plan against the current revision prefix.
pub(crate) fn classify_pod(pod: &Pod, prefix: &str) -> PodDisposition {
    let name = pod.metadata.name.as_deref().unwrap_or("");
    if !name.starts_with(prefix) {
        return PodDisposition::Stale;
    }

    if let Some(exit_code) = terraform_exit_code(pod) {
        return PodDisposition::Finished { exit_code };
    }

    let phase = pod
        .status
        .as_ref()
        .and_then(|status| status.phase.as_deref())
        .unwrap_or("");
    match phase {
        "" | "Pending" | "Running" => PodDisposition::Keep,
        _ => PodDisposition::Aborted,
    }
}

/// Exit code of the terraform container, if it terminated.
pub(crate) fn terraform_exit_code(pod: &Pod) -> Option<i32> {
    pod.status
        .as_ref()?
        .container_statuses
        .as_ref()?
        .iter()
        .find(|status| status.name == TERRAFORM_CONTAINER)?
        .state
        .as_ref()?
        .terminated
        .as_ref()
        .map(|terminated| terminated.exit_code)
}

/// Phase of a finished run: failures are terminal, successful plan-only runs
/// wait for approval, successful applies are done.
pub(crate) fn terminal_phase(exit_code: i32, approved: bool) -> Phase {
    if exit_code != 0 {
        Phase::Fail
    } else if approved {
        Phase::Done
    } else {
        Phase::WaitingConfirmation
    }
}
