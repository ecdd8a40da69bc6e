//! Command implementations.

mod harvest;
mod init;
mod serve;
mod stats;

pub use harvest::{cmd_backfill, cmd_sweep, cmd_test_case, cmd_well};
pub use init::cmd_init;
pub use serve::cmd_serve;
pub use stats::cmd_stats;

use std::sync::Arc;

use crate::config::Settings;
use crate::harvest::Harvester;
use crate::pipeline::{FsObjectStore, HttpPipeline};
use crate::portal::{SessionCache, WeblinkClient, WellFilesClient};
use crate::repository::{DocketRepository, HarvestRepository};

/// Assemble a harvester from settings. Every command and the server use
/// the same wiring.
pub(crate) fn build_harvester(settings: &Settings) -> anyhow::Result<Arc<Harvester>> {
    std::fs::create_dir_all(&settings.data_dir)?;

    let db_path = settings.db_path();
    let harvest = Arc::new(HarvestRepository::new(&db_path)?);
    let docket = Arc::new(DocketRepository::new(&db_path)?);

    let sessions = SessionCache::new();
    let weblink = WeblinkClient::new(settings.weblink.to_client_config(), sessions.clone())?;
    let well_files = WellFilesClient::new(settings.well_files.to_client_config(), sessions)?;

    let pipeline = HttpPipeline::new(settings.pipeline.to_client_config())?;
    let store = FsObjectStore::new(&settings.objects_dir());

    Ok(Arc::new(Harvester::new(
        harvest,
        docket,
        Arc::new(weblink),
        Arc::new(well_files),
        Arc::new(pipeline),
        Arc::new(store),
        settings.user_id.clone(),
        settings.harvest.clone(),
    )))
}
