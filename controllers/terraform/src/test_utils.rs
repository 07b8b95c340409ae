//! Test utilities for unit testing the reconcilers.

use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateTerminated, ContainerStatus, Pod, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crds::{
    TerraformConfiguration, TerraformConfigurationSpec, TerraformPlan, TerraformPlanSpec,
};

pub fn make_configuration(name: &str, namespace: &str, configuration: &str) -> TerraformConfiguration {
    TerraformConfiguration {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some("configuration-uid".to_string()),
            ..ObjectMeta::default()
        },
        spec: TerraformConfigurationSpec {
            configuration: configuration.to_string(),
            values: None,
            paused: false,
            auto_approve: false,
            template: None,
        },
        status: None,
    }
}

pub fn make_plan(name: &str, namespace: &str, configuration: &str, approved: bool) -> TerraformPlan {
    TerraformPlan {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some("plan-uid".to_string()),
            ..ObjectMeta::default()
        },
        spec: TerraformPlanSpec {
            approved,
            configuration: configuration.to_string(),
            values: None,
            template: None,
        },
        status: None,
    }
}

/// Pod with an optional phase and, when `exit_code` is given, a terminated
/// `terraform` container status.
pub fn make_pod(name: &str, phase: Option<&str>, exit_code: Option<i32>) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(PodStatus {
            phase: phase.map(str::to_string),
            container_statuses: exit_code.map(|code| {
                vec![ContainerStatus {
                    name: "terraform".to_string(),
                    state: Some(ContainerState {
                        terminated: Some(ContainerStateTerminated {
                            exit_code: code,
                            ..ContainerStateTerminated::default()
                        }),
                        ..ContainerState::default()
                    }),
                    ..ContainerStatus::default()
                }]
            }),
            ..PodStatus::default()
        }),
        ..Pod::default()
    }
}
