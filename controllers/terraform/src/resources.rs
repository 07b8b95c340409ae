//! Builders for the pod and config map materialized per plan revision.
//!
//! The pod runs two containers sharing localhost: `terraform` executes the
//! actual plan or apply over the mounted configuration, `backend` serves the
//! terraform HTTP state backend against the owning TerraformState object.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, EnvVar, Pod, PodSecurityContext, PodSpec, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use crds::TerraformPlan;

use crate::reconcile_helpers::hashed_name;

/// Image carrying both the terraform binary and the tfops binary.
pub(crate) const IMAGE: &str = "ghcr.io/tfops/tfops:latest";

pub(crate) const TERRAFORM_CONTAINER: &str = "terraform";
pub(crate) const BACKEND_CONTAINER: &str = "backend";

/// Annotation pairing a run pod with its config map so the pair is deleted
/// together.
pub(crate) const LINKED_CONFIG_MAP_ANNOTATION: &str = "tfops.io/linked-config-map";

pub(crate) const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub(crate) const MANAGED_BY_VALUE: &str = "tfops";

/// Label naming the owning plan; owned-object listing selects on it.
pub(crate) const PLAN_LABEL: &str = "terraform.tfops.io/plan";

pub(crate) const CONFIG_MOUNT_PATH: &str = "/terraform/config";
const CONFIG_VOLUME: &str = "tfconfig";

const TERRAFORM_PLAN_SCRIPT: &str = "terraform init\nterraform plan -input=false -no-color";
const TERRAFORM_APPLY_SCRIPT: &str =
    "terraform init\nterraform apply -input=false -no-color -auto-approve";

/// Backend configuration pointing terraform at the sidecar on localhost.
pub(crate) const TERRAFORM_BACKEND_CONFIG: &str = r#"terraform {
  required_version = ">= 0.12"
  backend "http" {
    address        = "http://localhost:8081/"
    lock_address   = "http://localhost:8081/"
    unlock_address = "http://localhost:8081/"
  }
}
"#;

fn shell_cmd(script: &str) -> String {
    format!("set -exuf -o pipefail\n{script}")
}

fn run_labels(plan_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (PLAN_LABEL.to_string(), plan_name.to_string()),
    ])
}

/// Config map holding the terraform working directory for one spec revision:
/// the configuration itself, the variable values and the backend wiring.
pub(crate) fn generate_config_map(plan: &TerraformPlan, spec_hash: &str) -> ConfigMap {
    let plan_name = plan.name_any();

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(hashed_name(&plan_name, spec_hash)),
            namespace: plan.namespace(),
            labels: Some(run_labels(&plan_name)),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([
            ("main.tf".to_string(), plan.spec.configuration.clone()),
            (
                "terraform.tfvars".to_string(),
                plan.spec.values.clone().unwrap_or_default(),
            ),
            (
                "backend.tf".to_string(),
                TERRAFORM_BACKEND_CONFIG.to_string(),
            ),
        ])),
        ..ConfigMap::default()
    }
}

/// Pod running terraform against one spec revision.
///
/// Named `"<planName>-<specHash>-<random>"` via generate_name so a reschedule
/// never collides; marked non-root with restart policy Never so a failed run
/// does not silently retry.
pub(crate) fn generate_pod(plan: &TerraformPlan, spec_hash: &str) -> Pod {
    let plan_name = plan.name_any();
    let namespace = plan.namespace();
    let config_name = hashed_name(&plan_name, spec_hash);
    let template = plan.spec.template.clone().unwrap_or_default();

    let script = if plan.spec.approved {
        TERRAFORM_APPLY_SCRIPT
    } else {
        TERRAFORM_PLAN_SCRIPT
    };

    let mut env = template.env;
    env.push(EnvVar {
        name: "TF_DATA_DIR".to_string(),
        value: Some("/tmp/tfdata".to_string()),
        ..EnvVar::default()
    });
    env.push(EnvVar {
        name: "TF_IN_AUTOMATION".to_string(),
        value: Some("1".to_string()),
        ..EnvVar::default()
    });

    let mut volume_mounts = template.volume_mounts;
    volume_mounts.push(VolumeMount {
        name: CONFIG_VOLUME.to_string(),
        mount_path: CONFIG_MOUNT_PATH.to_string(),
        ..VolumeMount::default()
    });

    let mut volumes = template.volumes;
    volumes.push(Volume {
        name: CONFIG_VOLUME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: Some(config_name.clone()),
            optional: Some(false),
            ..ConfigMapVolumeSource::default()
        }),
        ..Volume::default()
    });

    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{config_name}-")),
            namespace: namespace.clone(),
            annotations: Some(BTreeMap::from([(
                LINKED_CONFIG_MAP_ANNOTATION.to_string(),
                config_name,
            )])),
            labels: Some(run_labels(&plan_name)),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            security_context: Some(PodSecurityContext {
                run_as_non_root: Some(true),
                ..PodSecurityContext::default()
            }),
            service_account_name: template.service_account_name,
            restart_policy: Some("Never".to_string()),
            containers: vec![
                Container {
                    name: TERRAFORM_CONTAINER.to_string(),
                    image: Some(IMAGE.to_string()),
                    command: Some(vec!["/bin/sh".to_string()]),
                    args: Some(vec!["-c".to_string(), shell_cmd(script)]),
                    working_dir: Some(CONFIG_MOUNT_PATH.to_string()),
                    env: Some(env),
                    env_from: if template.env_from.is_empty() {
                        None
                    } else {
                        Some(template.env_from)
                    },
                    volume_mounts: Some(volume_mounts),
                    ..Container::default()
                },
                Container {
                    name: BACKEND_CONTAINER.to_string(),
                    image: Some(IMAGE.to_string()),
                    command: Some(vec![
                        "/tfops".to_string(),
                        "backend".to_string(),
                        "--name".to_string(),
                        plan_name,
                        "--namespace".to_string(),
                        namespace.unwrap_or_default(),
                    ]),
                    ..Container::default()
                },
            ],
            volumes: Some(volumes),
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}
