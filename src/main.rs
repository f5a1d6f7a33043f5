use anyhow::Result;
use efakture_sync::client::ApiClient;
use efakture_sync::contract::TokioPause;
use efakture_sync::load_config;
use efakture_sync::schedule::Scheduler;
use tracing::{error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Logging first, so configuration errors end up in the log file too.
    let _log_guard = efakture_sync::logging::init(&load_config::log_file())?;
    info!("Application startup: tracing initialised, environment loaded");

    let config = load_config::load_config()?;
    config.trace_loaded();

    let api = ApiClient::new(&config.api)?;
    let scheduler = Scheduler::new(config, api, TokioPause);
    scheduler.layout().ensure()?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, stopping once the current cycle has finished");
                let _ = stop_tx.send(());
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });
    let shutdown = async move {
        // A dropped sender means no signal listener; keep running.
        if stop_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let result = scheduler.run_until(shutdown).await;
    if let Err(e) = &result {
        error!(error = %e, "Synchronisation loop stopped");
    }
    result?;
    Ok(())
}
