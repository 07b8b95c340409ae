//! Controller manager wiring.
//!
//! Registers the configuration and plan controllers with their owned-object
//! watches, drives both until a shutdown signal, and serves a small
//! diagnostics endpoint on the metrics address.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use kube_runtime::controller::{Action, Config as ControllerConfig, Controller};
use kube_runtime::watcher;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crds::{TerraformConfiguration, TerraformPlan, TerraformState};

use crate::error::ControllerError;
use crate::reconciler::{reconcile_configuration, reconcile_plan, Reconciler};

/// Controller manager options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Address the diagnostics endpoint binds to, `:8080` shorthand accepted
    pub metrics_addr: String,
    /// Leader election request from the CLI
    pub leader_election: bool,
    /// Namespace to watch over
    pub namespace: String,
}

/// Runs both controllers until SIGINT / SIGTERM.
pub async fn launch(opts: Options) -> Result<(), ControllerError> {
    info!("starting controller manager, namespace {}", opts.namespace);

    if opts.leader_election {
        warn!("leader election requested but not available, running as a single instance");
    }

    let client = Client::try_default().await?;
    let ctx = Arc::new(Reconciler::new(client.clone(), &opts.namespace));

    let configurations: Api<TerraformConfiguration> =
        Api::namespaced(client.clone(), &opts.namespace);
    let plans: Api<TerraformPlan> = Api::namespaced(client.clone(), &opts.namespace);
    let states: Api<TerraformState> = Api::namespaced(client.clone(), &opts.namespace);
    let pods: Api<Pod> = Api::namespaced(client, &opts.namespace);

    // Debounce batches bursts of status updates, concurrency bounds the
    // number of keys reconciling in parallel per controller.
    let controller_config = || {
        ControllerConfig::default()
            .debounce(Duration::from_secs(1))
            .concurrency(4)
    };

    let configuration_controller = Controller::new(configurations, watcher::Config::default())
        .owns(plans.clone(), watcher::Config::default())
        .owns(states, watcher::Config::default())
        .with_config(controller_config())
        .shutdown_on_signal()
        .run(reconcile_configuration, error_policy, ctx.clone())
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!("reconciled TerraformConfiguration {:?}", object),
                Err(err) => error!("TerraformConfiguration controller error: {}", err),
            }
        });

    let plan_controller = Controller::new(plans, watcher::Config::default())
        .owns(pods, watcher::Config::default())
        .with_config(controller_config())
        .shutdown_on_signal()
        .run(reconcile_plan, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!("reconciled TerraformPlan {:?}", object),
                Err(err) => error!("TerraformPlan controller error: {}", err),
            }
        });

    let diagnostics = tokio::spawn(serve_diagnostics(normalize_bind_addr(&opts.metrics_addr)));

    futures::join!(configuration_controller, plan_controller);

    diagnostics.abort();
    info!("controller manager stopped");
    Ok(())
}

fn error_policy<K: Debug>(object: Arc<K>, error: &ControllerError, _ctx: Arc<Reconciler>) -> Action {
    error!("reconciliation failed for {:?}: {}", object, error);
    Action::requeue(Duration::from_secs(60))
}

async fn serve_diagnostics(addr: String) {
    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }));

    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            info!("diagnostics endpoint listening on {}", addr);
            if let Err(err) = axum::serve(listener, app).await {
                error!("diagnostics endpoint failed: {}", err);
            }
        }
        Err(err) => error!("unable to bind diagnostics endpoint on {}: {}", addr, err),
    }
}

/// Accepts the `:8080` port-only shorthand for an all-interfaces bind.
fn normalize_bind_addr(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => addr.to_string(),
    }
}
