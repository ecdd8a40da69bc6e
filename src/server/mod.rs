//! HTTP surface for triggering sweeps and inspecting harvest state.
//!
//! The scheduled path and the manual path share one code path: an
//! in-process interval loop (when configured) calls the same
//! `Harvester::run_sweep` the POST /trigger handler does.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::ServerSettings;
use crate::harvest::Harvester;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub harvester: Arc<Harvester>,
    /// Serializes sweeps: a manual trigger during a scheduled run waits
    /// instead of interleaving portal traffic.
    pub sweep_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(harvester: Arc<Harvester>) -> Self {
        Self {
            harvester,
            sweep_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Start the web server, with the optional in-process sweep scheduler.
pub async fn serve(harvester: Arc<Harvester>, settings: &ServerSettings) -> anyhow::Result<()> {
    let state = AppState::new(harvester);

    if let Some(mins) = settings.sweep_interval_mins {
        let scheduled = state.clone();
        tokio::spawn(async move {
            let period = tokio::time::Duration::from_secs(mins * 60);
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                let _guard = scheduled.sweep_lock.lock().await;
                // A failed sweep must never take the scheduler down.
                if let Err(e) = scheduled.harvester.run_sweep().await {
                    error!(error = %e, "scheduled sweep failed");
                }
            }
        });
        info!(interval_mins = mins, "in-process sweep scheduler started");
    }

    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
