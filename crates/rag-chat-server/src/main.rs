use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use rag_chat_server::config::Settings;
use rag_chat_server::database::{
    ChatHistoryRepository, ChatHistoryStore, DbPool, InMemoryChatHistory,
};
use rag_chat_server::services::{InMemoryShareStore, ShareService};
use rag_chat_server::utils::logger::init_logger;
use rag_chat_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logger()?;

    info!("🚀 Starting RAG chat server...");

    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    let history_store: Arc<dyn ChatHistoryStore> = match &settings.database {
        Some(db_config) => {
            let pool = DbPool::new(db_config).await?;
            info!("✅ Database connection established");
            Arc::new(ChatHistoryRepository::new(pool))
        }
        None => {
            warn!("No database configured, chat history is kept in memory only");
            Arc::new(InMemoryChatHistory::new())
        }
    };

    let share_store = Arc::new(InMemoryShareStore::new(settings.share.ttl_seconds));
    let cleanup_interval = Duration::from_secs(settings.share.cleanup_interval_seconds.max(1));

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    let state = AppState::new(&settings, history_store, share_store)?;
    spawn_share_cleanup(state.share_service.clone(), cleanup_interval);

    let app = build_router(state);

    info!("🎯 Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Periodically purge expired share links.
fn spawn_share_cleanup(share_service: Arc<ShareService>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            share_service.cleanup_expired();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
