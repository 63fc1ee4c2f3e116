//! Workflow service binary: a standalone HTTP server fronting the graph runtime.

use std::sync::Arc;

use workflow_checkpoint::memory::InMemoryCheckpointSaver;
use workflow_checkpoint::sqlite::SqliteCheckpointSaver;
use workflow_checkpoint::CheckpointSaver;
use workflow_llm::{ClaudeGateway, GatewayConfig};
use workflow_service::api::routes::create_router;
use workflow_service::{ServiceConfig, WorkflowService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config = ServiceConfig::from_env().map_err(|e| format!("configuration error: {e}"))?;

    let checkpointer: Arc<dyn CheckpointSaver> = match &config.database_url {
        Some(url) => {
            tracing::info!(url, "connecting durable checkpointer");
            Arc::new(SqliteCheckpointSaver::new(url).await?)
        }
        None => {
            tracing::warn!(
                "WORKFLOW_DATABASE_URL is not set; checkpoints will not survive a restart"
            );
            Arc::new(InMemoryCheckpointSaver::default())
        }
    };
    tracing::info!(backend = checkpointer.backend_kind(), "checkpointer ready");

    let gateway_config = GatewayConfig::new(config.llm_api_key.clone(), config.llm_base_url.clone(), config.llm_model.clone())
        .with_timeout(std::time::Duration::from_secs(config.request_timeout_secs))
        .with_planner_retry_limit(config.planner_retry_limit)
        .with_max_tool_call_iterations(config.max_tool_call_iterations);
    let gateway = Arc::new(ClaudeGateway::new(gateway_config));

    let service = Arc::new(WorkflowService::new(checkpointer, gateway));
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "workflow service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("workflow service shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install CTRL-C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received CTRL-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
