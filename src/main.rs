use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;

use backoffice_api::config::{init_tracing, load_config};
use backoffice_api::events::{process_events, EventSender};
use backoffice_api::handlers::AppServices;
use backoffice_api::{app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(config.log_level(), config.log_json);

    info!(environment = %config.environment, "Starting back-office API");

    let pool = db::establish_connection_from_app_config(&config).await?;
    if config.auto_migrate {
        db::run_migrations(&pool).await?;
    }

    let (tx, rx) = mpsc::channel(config.event_buffer_size);
    let event_sender = EventSender::new(tx);
    tokio::spawn(process_events(rx));

    let db = Arc::new(pool);
    let services = AppServices::new(db.clone(), Arc::new(event_sender.clone()));

    let addr: SocketAddr = config.bind_addr().parse()?;
    let state = AppState {
        db,
        config,
        event_sender,
        services,
    };

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
