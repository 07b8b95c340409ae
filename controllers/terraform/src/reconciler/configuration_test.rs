//! Unit tests for plan derivation and state seeding.

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::EnvVar;

    use crds::PodTemplate;

    use crate::reconciler::configuration::{derive_plan_spec, initial_state_document};
    use crate::test_utils::make_configuration;

    #[test]
    fn plan_spec_copies_the_configuration() {
        let mut config = make_configuration("web", "default", "resource \"null_resource\" \"a\" {}");
        config.spec.values = Some("x = 1".to_string());
        config.spec.auto_approve = true;
        config.spec.template = Some(PodTemplate {
            service_account_name: Some("terraform-runner".to_string()),
            ..PodTemplate::default()
        });

        let derived = derive_plan_spec(&config.spec);

        assert!(derived.approved);
        assert_eq!(derived.configuration, "resource \"null_resource\" \"a\" {}");
        assert_eq!(derived.values.as_deref(), Some("x = 1"));
        assert_eq!(
            derived
                .template
                .as_ref()
                .and_then(|t| t.service_account_name.as_deref()),
            Some("terraform-runner")
        );
    }

    #[test]
    fn derivation_is_stable_for_unchanged_configurations() {
        let config = make_configuration("web", "default", "cfg");
        assert_eq!(derive_plan_spec(&config.spec), derive_plan_spec(&config.spec));
    }

    #[test]
    fn spec_drift_is_visible_through_comparison() {
        let config = make_configuration("web", "default", "resource \"null_resource\" \"a\" {}");
        let mut edited = config.clone();
        edited.spec.configuration = "resource \"null_resource\" \"b\" {}".to_string();

        assert_ne!(derive_plan_spec(&config.spec), derive_plan_spec(&edited.spec));
    }

    #[test]
    fn emptied_template_arrays_still_read_as_drift() {
        let mut config = make_configuration("web", "default", "cfg");
        config.spec.template = Some(PodTemplate {
            env: vec![EnvVar {
                name: "AWS_REGION".to_string(),
                value: Some("eu-central-1".to_string()),
                ..EnvVar::default()
            }],
            ..PodTemplate::default()
        });
        let stored = derive_plan_spec(&config.spec);

        config.spec.template = Some(PodTemplate::default());
        let desired = derive_plan_spec(&config.spec);

        // the reconciler overwrites the whole spec on drift, so the
        // comparison has to catch an array going non-empty -> empty
        assert_ne!(stored, desired);
        assert_eq!(desired, desired.clone());
    }

    #[test]
    fn initial_state_is_a_fresh_version_4_document() {
        let document = initial_state_document("3f0c4d2e-8a1b-4a6e-9a36-0f6a2c9d1b42");

        assert_eq!(document["version"], 4);
        assert_eq!(document["serial"], 1);
        assert_eq!(document["lineage"], "3f0c4d2e-8a1b-4a6e-9a36-0f6a2c9d1b42");
    }
}
