//! Helper functions shared by the reconcilers.
//!
//! Spec fingerprinting, derived names and the owner-reference filter used
//! when listing objects created for a plan revision.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use sha2::{Digest, Sha256};

use crds::TerraformPlanSpec;

use crate::error::ControllerError;

/// Length of the rendered spec hash token.
pub(crate) const SPEC_HASH_LEN: usize = 10;

/// Deterministic fingerprint of a plan spec.
///
/// The spec serializes to canonical JSON (struct declaration order), is
/// hashed with SHA-256 and rendered as lowercase hex truncated to
/// [`SPEC_HASH_LEN`] characters, which keeps the token safe for use inside
/// kubernetes resource names.
pub(crate) fn spec_hash(spec: &TerraformPlanSpec) -> Result<String, ControllerError> {
    let canonical = serde_json::to_vec(spec)?;
    let digest = Sha256::digest(&canonical);

    let mut token = String::with_capacity(SPEC_HASH_LEN);
    for byte in digest.iter().take(SPEC_HASH_LEN / 2) {
        token.push_str(&format!("{byte:02x}"));
    }
    Ok(token)
}

/// Name shared by the config map of a plan revision and used as the pod name
/// prefix: `"<planName>-<specHash>"`.
pub(crate) fn hashed_name(plan_name: &str, spec_hash: &str) -> String {
    format!("{plan_name}-{spec_hash}")
}

/// True when `meta` names `owner_uid` as its controller owner.
pub(crate) fn controlled_by(meta: &ObjectMeta, owner_uid: &str) -> bool {
    meta.owner_references
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .any(|reference| reference.controller == Some(true) && reference.uid == owner_uid)
}

/// True for create conflicts (duplicate names after a partial prior
/// reconcile); those are absorbed and the pass continues.
pub(crate) fn is_conflict(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(response) if response.code == 409)
}

/// Swallows NotFound / Gone on deletes of objects that may already be away.
pub(crate) fn ignore_gone<T>(result: Result<T, kube::Error>) -> Result<(), kube::Error> {
    match result {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(response)) if response.code == 404 || response.code == 410 => Ok(()),
        Err(err) => Err(err),
    }
}
