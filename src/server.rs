use std::sync::Arc;

use tracing::{info, warn};

use crate::AppState;
use crate::api::build_router;
use crate::config::AppConfig;
use crate::grounded::GroundedChatOrchestrator;
use crate::openai::{FileUploader, OpenAiAssistants, OpenAiClient};

/// Wire providers from configuration into the shared application state.
pub fn build_state(config: Arc<AppConfig>) -> AppState {
    let Some(settings) = config.openai_settings() else {
        warn!(
            name: "openai.config.missing",
            "OPENAI_API_KEY is not set; uploads and grounded chat are disabled"
        );
        return AppState {
            grounded: None,
            uploader: None,
            config,
        };
    };

    info!(
        name: "openai.config.loaded",
        base_url = %settings.base_url,
        assistant_id = ?settings.assistant_id,
        "OpenAI configuration loaded"
    );

    let client = OpenAiClient::new(settings);
    let uploader: Arc<dyn FileUploader> = Arc::new(client.clone());

    let grounded = match OpenAiAssistants::from_client(client) {
        Some(assistants) => Some(GroundedChatOrchestrator::new(
            Arc::new(assistants),
            config.poll_policy(),
        )),
        None => {
            warn!(
                name: "openai.assistant.missing",
                "OPENAI_ASSISTANT_ID is not set; grounded chat is disabled"
            );
            None
        }
    };

    AppState {
        grounded,
        uploader: Some(uploader),
        config,
    }
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(Arc::clone(&config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        poll_interval_ms = config.polling.interval_ms,
        poll_max_attempts = config.polling.max_attempts,
        "Server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}
