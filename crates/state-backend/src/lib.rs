//! Terraform HTTP state backend.
//!
//! Runs as a sidecar next to the terraform container and proxies the
//! remote-state protocol (pull / push / lock / unlock) onto one
//! TerraformState object in the cluster. Terraform reaches it over
//! localhost only; the `(name, namespace)` mapping is fixed for the
//! lifetime of the process.

pub mod error;
mod handler;

use axum::Router;
use kube::{Api, Client};
use tokio::net::TcpListener;
use tracing::info;

use crds::TerraformState;

pub use error::BackendError;

/// State backend options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Name of the TerraformState object to proxy
    pub name: String,
    /// Namespace of the TerraformState object
    pub namespace: String,
    /// Listen address, e.g. `localhost:8081`
    pub listen: String,
}

/// Launches the backend with in-cluster (or kubeconfig) credentials and
/// serves until SIGINT / SIGTERM.
pub async fn listen_and_serve(opts: Options) -> Result<(), BackendError> {
    let client = Client::try_default().await?;
    serve_with_client(client, opts).await
}

/// Serves the backend using the given client. Split out so tests and callers
/// with a preconfigured client can reuse the wiring.
pub async fn serve_with_client(client: Client, opts: Options) -> Result<(), BackendError> {
    let target = format!("{}/{}", opts.namespace, opts.name);
    info!(listen = %opts.listen, state = %target, "starting terraform state backend");

    let states: Api<TerraformState> = Api::namespaced(client, &opts.namespace);
    let context = handler::BackendContext {
        states,
        name: opts.name,
    };

    // Terraform ignores paths; every request lands on the same handler which
    // dispatches on the method (including the LOCK / UNLOCK extension verbs).
    let app = Router::new().fallback(handler::dispatch).with_state(context);

    let listener = TcpListener::bind(&opts.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("terraform state backend stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => {
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
