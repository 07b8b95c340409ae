//! HTTP handler implementing the terraform remote-state protocol.
//!
//! A single endpoint multiplexes on the request method: GET pulls the state,
//! POST pushes it, LOCK and UNLOCK drive the lock protocol. Everything maps
//! onto one TerraformState object fixed at startup.

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use kube::api::{Patch, PatchParams, PostParams};
use kube::Api;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crds::TerraformState;

use crate::error::BackendError;

/// Envelope of a terraform state document; only enough is decoded to enforce
/// lineage, everything else passes through untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StateEnvelope {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub lineage: String,
    #[serde(default)]
    pub serial: u64,
}

/// Lock envelope sent by terraform on LOCK and UNLOCK. Only `ID` is used to
/// enforce mutual exclusion; the remaining fields are informational.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
#[allow(dead_code)]
pub(crate) struct LockInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Operation")]
    pub operation: String,
    #[serde(rename = "Info")]
    pub info: String,
    #[serde(rename = "Who")]
    pub who: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Created")]
    pub created: String,
    #[serde(rename = "Path")]
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StateQuery {
    #[serde(rename = "ID")]
    pub id: Option<String>,
}

/// Per-process handler state: the Api bound to the target namespace and the
/// name of the one TerraformState this backend proxies.
#[derive(Clone)]
pub(crate) struct BackendContext {
    pub states: Api<TerraformState>,
    pub name: String,
}

/// Entry point for every request; paths are ignored, the method selects the verb.
pub(crate) async fn dispatch(
    State(ctx): State<BackendContext>,
    method: Method,
    Query(query): Query<StateQuery>,
    body: Bytes,
) -> Response {
    debug!(method = %method, "state backend request");

    let result = match method.as_str() {
        "GET" => ctx.pull_state().await,
        "POST" => {
            ctx.push_state(query.id.as_deref().unwrap_or(""), &body)
                .await
        }
        "LOCK" => ctx.lock_state(&body).await,
        "UNLOCK" => ctx.unlock_state(&body).await,
        _ => Err(BackendError::UnknownVerb),
    };

    match result {
        Ok(response) => response,
        Err(err) => {
            warn!(method = %method, error = %err, "state backend request failed");
            err.into_response()
        }
    }
}

impl BackendContext {
    /// Fetches the state object and its non-empty state document.
    async fn get_state(&self) -> Result<(TerraformState, serde_json::Value), BackendError> {
        let state = self.states.get(&self.name).await?;
        let document = state.spec.state.clone().ok_or(BackendError::EmptyState)?;
        Ok((state, document))
    }

    fn held_lock(state: &TerraformState) -> &str {
        state
            .status
            .as_ref()
            .map(|s| s.lock_id.as_str())
            .unwrap_or("")
    }

    pub(crate) async fn pull_state(&self) -> Result<Response, BackendError> {
        let (_, document) = self.get_state().await?;
        let raw = serde_json::to_vec(&document)?;
        Ok(([(header::CONTENT_TYPE, "application/json")], raw).into_response())
    }

    pub(crate) async fn push_state(
        &self,
        lock_id: &str,
        body: &[u8],
    ) -> Result<Response, BackendError> {
        if lock_id.is_empty() {
            return Err(BackendError::EmptyLockId);
        }

        let incoming_document: serde_json::Value = serde_json::from_slice(body)?;
        let incoming: StateEnvelope = serde_json::from_value(incoming_document.clone())?;

        let (mut state, stored_document) = self.get_state().await?;
        let existing: StateEnvelope = serde_json::from_value(stored_document)?;

        check_lineage(&existing, &incoming)?;

        if Self::held_lock(&state) != lock_id {
            return Err(BackendError::Locked);
        }

        // Replace, not merge: the stored document must become exactly the
        // pushed body, including keys the new state dropped.
        state.spec.state = Some(incoming_document);
        self.states
            .replace(&self.name, &PostParams::default(), &state)
            .await?;

        info!(serial = incoming.serial, version = incoming.version, "state pushed");
        Ok(StatusCode::OK.into_response())
    }

    pub(crate) async fn lock_state(&self, body: &[u8]) -> Result<Response, BackendError> {
        let lock: LockInfo = serde_json::from_slice(body)?;
        let (state, _) = self.get_state().await?;

        lock_decision(Self::held_lock(&state), &lock.id)?;

        let patch = json!({ "status": { "lockID": lock.id, "lockedSince": Utc::now() } });
        self.states
            .patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!(lock_id = %lock.id, "state locked");
        Ok(StatusCode::OK.into_response())
    }

    pub(crate) async fn unlock_state(&self, body: &[u8]) -> Result<Response, BackendError> {
        let lock: LockInfo = serde_json::from_slice(body)?;
        let (state, _) = self.get_state().await?;

        unlock_decision(Self::held_lock(&state), &lock.id)?;

        let patch = json!({ "status": { "lockID": "", "lockedSince": null } });
        self.states
            .patch_status(&self.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;

        info!(lock_id = %lock.id, "state unlocked");
        Ok(StatusCode::OK.into_response())
    }
}

/// A lock is acquired iff no lock is currently held.
pub(crate) fn lock_decision(held: &str, requested: &str) -> Result<(), BackendError> {
    if requested.is_empty() {
        return Err(BackendError::EmptyLockId);
    }
    if !held.is_empty() {
        return Err(BackendError::Locked);
    }
    Ok(())
}

/// A lock is released iff the caller presents the held ID.
pub(crate) fn unlock_decision(held: &str, requested: &str) -> Result<(), BackendError> {
    if requested.is_empty() {
        return Err(BackendError::EmptyLockId);
    }
    if requested != held {
        return Err(BackendError::Locked);
    }
    Ok(())
}

/// Pushes must preserve the lineage stamped into the stored state.
pub(crate) fn check_lineage(
    existing: &StateEnvelope,
    incoming: &StateEnvelope,
) -> Result<(), BackendError> {
    if existing.lineage != incoming.lineage {
        return Err(BackendError::AlienLineage);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(lineage: &str) -> StateEnvelope {
        StateEnvelope {
            version: 4,
            lineage: lineage.to_string(),
            serial: 1,
        }
    }

    #[test]
    fn lock_acquired_when_free() {
        assert!(lock_decision("", "A").is_ok());
    }

    #[test]
    fn lock_with_empty_id_rejected() {
        assert!(matches!(
            lock_decision("", ""),
            Err(BackendError::EmptyLockId)
        ));
    }

    #[test]
    fn lock_contention_rejected() {
        assert!(matches!(lock_decision("A", "B"), Err(BackendError::Locked)));
        // re-locking with the same ID is also a contention error
        assert!(matches!(lock_decision("A", "A"), Err(BackendError::Locked)));
    }

    #[test]
    fn unlock_requires_matching_id() {
        assert!(unlock_decision("A", "A").is_ok());
        assert!(matches!(
            unlock_decision("A", "B"),
            Err(BackendError::Locked)
        ));
        assert!(matches!(
            unlock_decision("A", ""),
            Err(BackendError::EmptyLockId)
        ));
    }

    #[test]
    fn lock_then_unlock_round_trip() {
        let mut held = String::new();
        lock_decision(&held, "A").unwrap();
        held = "A".to_string();
        assert!(matches!(lock_decision(&held, "B"), Err(BackendError::Locked)));
        unlock_decision(&held, "A").unwrap();
        held.clear();
        assert!(lock_decision(&held, "B").is_ok());
    }

    #[test]
    fn matching_lineage_accepted() {
        assert!(check_lineage(&envelope("L1"), &envelope("L1")).is_ok());
    }

    #[test]
    fn alien_lineage_rejected() {
        assert!(matches!(
            check_lineage(&envelope("L1"), &envelope("L2")),
            Err(BackendError::AlienLineage)
        ));
    }

    #[test]
    fn envelope_decodes_from_full_state_document() {
        let raw = serde_json::json!({
            "version": 4,
            "terraform_version": "1.5.7",
            "serial": 7,
            "lineage": "3f0c4d2e-8a1b-4a6e-9a36-0f6a2c9d1b42",
            "outputs": {},
            "resources": [{"type": "null_resource", "name": "a"}]
        });
        let envelope: StateEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.version, 4);
        assert_eq!(envelope.serial, 7);
        assert_eq!(envelope.lineage, "3f0c4d2e-8a1b-4a6e-9a36-0f6a2c9d1b42");
    }

    #[test]
    fn envelope_fields_default_when_missing() {
        let envelope: StateEnvelope = serde_json::from_str("{}").unwrap();
        assert_eq!(envelope.version, 0);
        assert_eq!(envelope.serial, 0);
        assert!(envelope.lineage.is_empty());
    }

    #[test]
    fn lock_info_decodes_terraform_payload() {
        let raw = r#"{
            "ID": "f5c8a7e0-7d1c-1c1e-2f3a-4b5c6d7e8f90",
            "Operation": "OperationTypeApply",
            "Info": "",
            "Who": "ci@runner",
            "Version": "1.5.7",
            "Created": "2023-10-01T12:00:00Z",
            "Path": ""
        }"#;
        let lock: LockInfo = serde_json::from_str(raw).unwrap();
        assert_eq!(lock.id, "f5c8a7e0-7d1c-1c1e-2f3a-4b5c6d7e8f90");
        assert_eq!(lock.who, "ci@runner");
    }

    #[test]
    fn lock_info_tolerates_missing_fields() {
        let lock: LockInfo = serde_json::from_str(r#"{"ID": "A"}"#).unwrap();
        assert_eq!(lock.id, "A");
        assert!(lock.operation.is_empty());
    }
}
