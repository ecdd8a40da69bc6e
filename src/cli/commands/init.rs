//! Initialize command.

use console::style;

use crate::config::Settings;
use crate::repository::{DocketRepository, HarvestRepository};

/// Initialize the data directory, database schema, and config file.
pub async fn cmd_init(settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(&settings.data_dir)?;
    std::fs::create_dir_all(settings.objects_dir())?;

    // Opening the repositories creates the schema.
    let db_path = settings.db_path();
    HarvestRepository::new(&db_path)?;
    DocketRepository::new(&db_path)?;
    println!("  {} Database ready at {}", style("✓").green(), db_path.display());

    let config_path = settings.config_path();
    if config_path.exists() {
        println!(
            "  {} Keeping existing config at {}",
            style("!").yellow(),
            config_path.display()
        );
    } else {
        let rendered = toml::to_string_pretty(settings)?;
        std::fs::write(&config_path, rendered)?;
        println!("  {} Wrote config to {}", style("✓").green(), config_path.display());
        println!("    Set portal credentials via WEBLINK_* / WELLFILES_* env vars or the config file");
    }

    println!(
        "{} Initialized regharvest in {}",
        style("✓").green(),
        settings.data_dir.display()
    );
    Ok(())
}
