//! Unit tests for pod classification and terminal phase mapping.

#[cfg(test)]
mod tests {
    use crds::Phase;

    use crate::reconciler::plan::{
        classify_pod, terminal_phase, terraform_exit_code, PodDisposition,
    };
    use crate::test_utils::make_pod;

    const PREFIX: &str = "web-0a1b2c3d4e";

    #[test]
    fn pod_of_stale_revision_is_deleted() {
        let pod = make_pod("web-ffffffffff-abcde", Some("Running"), None);
        assert_eq!(classify_pod(&pod, PREFIX), PodDisposition::Stale);
    }

    #[test]
    fn running_pod_of_current_revision_is_kept() {
        let pod = make_pod("web-0a1b2c3d4e-abcde", Some("Running"), None);
        assert_eq!(classify_pod(&pod, PREFIX), PodDisposition::Keep);
    }

    #[test]
    fn pending_pod_is_kept() {
        let pod = make_pod("web-0a1b2c3d4e-abcde", Some("Pending"), None);
        assert_eq!(classify_pod(&pod, PREFIX), PodDisposition::Keep);
    }

    #[test]
    fn pod_without_phase_is_kept() {
        let pod = make_pod("web-0a1b2c3d4e-abcde", None, None);
        assert_eq!(classify_pod(&pod, PREFIX), PodDisposition::Keep);
    }

    #[test]
    fn terminated_terraform_container_finishes_the_run() {
        let pod = make_pod("web-0a1b2c3d4e-abcde", Some("Running"), Some(0));
        assert_eq!(
            classify_pod(&pod, PREFIX),
            PodDisposition::Finished { exit_code: 0 }
        );

        let failed = make_pod("web-0a1b2c3d4e-abcde", Some("Failed"), Some(1));
        assert_eq!(
            classify_pod(&failed, PREFIX),
            PodDisposition::Finished { exit_code: 1 }
        );
    }

    #[test]
    fn stale_revision_wins_over_termination() {
        // a terminated pod of an old revision is plain stale, its logs belong
        // to the previous spec
        let pod = make_pod("web-ffffffffff-abcde", Some("Failed"), Some(1));
        assert_eq!(classify_pod(&pod, PREFIX), PodDisposition::Stale);
    }

    #[test]
    fn terminal_pod_without_terminated_container_is_aborted() {
        for phase in ["Succeeded", "Failed", "Unknown"] {
            let pod = make_pod("web-0a1b2c3d4e-abcde", Some(phase), None);
            assert_eq!(classify_pod(&pod, PREFIX), PodDisposition::Aborted);
        }
    }

    #[test]
    fn exit_code_is_read_from_the_terraform_container() {
        let pod = make_pod("web-0a1b2c3d4e-abcde", Some("Running"), Some(2));
        assert_eq!(terraform_exit_code(&pod), Some(2));

        let not_terminated = make_pod("web-0a1b2c3d4e-abcde", Some("Running"), None);
        assert_eq!(terraform_exit_code(&not_terminated), None);
    }

    #[test]
    fn successful_plan_waits_for_confirmation() {
        assert_eq!(terminal_phase(0, false), Phase::WaitingConfirmation);
    }

    #[test]
    fn successful_apply_is_done() {
        assert_eq!(terminal_phase(0, true), Phase::Done);
    }

    #[test]
    fn nonzero_exit_fails_regardless_of_approval() {
        assert_eq!(terminal_phase(1, false), Phase::Fail);
        assert_eq!(terminal_phase(1, true), Phase::Fail);
    }
}
