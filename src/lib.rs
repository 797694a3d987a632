pub mod commands;
pub mod error;
pub mod host;
pub mod models;
pub mod page;
pub mod services;

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub use commands::{CoordinatorPort, Router, RouterHandle};
pub use error::{HostError, RewriteError};
pub use host::{BrowserHost, DetachedHost, TabId, WindowSpec};
pub use services::coordinator::Coordinator;

use models::Response;
use services::config_service::load_config;
use services::store::FileStore;

/// Install the global subscriber. `RUST_LOG` overrides the default `info` level; output goes to
/// stderr so stdout stays free for responses.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Serve wire messages from stdin, one JSON object per line, answering each on stdout.
pub async fn serve_stdio(router: &Router) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Value>(&line) {
            Ok(message) => router.dispatch(message).await,
            Err(e) => Response::failure(RewriteError::InvalidPayload(e.to_string()).to_string()),
        };
        let mut out = serde_json::to_string(&response)
            .unwrap_or_else(|e| format!(r#"{{"ok":false,"error":"{}"}}"#, e));
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn build_router() -> Result<Router, String> {
    let config = load_config()?;
    let store = FileStore::in_app_data_dir()?;
    let coordinator = Coordinator::new(config, Arc::new(store), Arc::new(DetachedHost))
        .map_err(|e| e.to_string())?;
    Ok(Router::with_coordinator(Arc::new(coordinator)))
}

pub fn run() {
    init_tracing();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("error while building tokio runtime");

    runtime.block_on(async {
        let router = match build_router() {
            Ok(router) => router,
            Err(e) => {
                error!(error = %e, "startup failed");
                return;
            }
        };
        info!("chameleon coordinator ready");
        if let Err(e) = serve_stdio(&router).await {
            error!(error = %e, "stdio loop stopped");
        }
    });
}
