use anyhow::Result;

use crate::config::Config;
use crate::relational::Topology;

/// Print each configured source and whether it looks usable, plus the
/// backend/scheduler settings operators usually want to confirm.
pub fn list_sources(config: &Config) -> Result<()> {
    println!("{:<14} {:<10} DETAIL", "SOURCE", "STATUS");

    let relational_status = if config.mock_db.enabled {
        "SHADOWED" // CSV mode takes precedence
    } else if config.relational.enabled {
        "ENABLED"
    } else {
        "DISABLED"
    };
    println!(
        "{:<14} {:<10} {}",
        "relational",
        relational_status,
        Topology::from_config(&config.relational).render()
    );

    let mock_detail = if config.mock_db.dir.is_dir() {
        config.mock_db.dir.display().to_string()
    } else {
        format!("{} (missing)", config.mock_db.dir.display())
    };
    println!(
        "{:<14} {:<10} {}",
        "mock_db",
        enabled_str(config.mock_db.enabled),
        mock_detail
    );

    println!(
        "{:<14} {:<10} {}",
        "log:was",
        enabled_str(config.logs.was_enabled),
        config.logs.was_dir.display()
    );
    println!(
        "{:<14} {:<10} {}",
        "log:db",
        enabled_str(config.logs.db_enabled),
        config.logs.db_dir.display()
    );

    println!(
        "{:<14} {:<10} {}:{}/{} dim={}",
        "vector",
        enabled_str(config.vector.enabled),
        config.vector.host,
        config.vector.port,
        config.vector.db,
        config.vector.dim
    );

    println!(
        "{:<14} {:<10} provider={} dims={} batch={}",
        "embedding",
        "-",
        config.embedding.provider,
        config.embedding.dims,
        config.embedding.batch_size
    );

    println!(
        "{:<14} {:<10} cron=\"{}\" (runs `opspulse etl` externally)",
        "scheduler",
        enabled_str(config.scheduler.enabled),
        config.scheduler.cron
    );

    Ok(())
}

fn enabled_str(enabled: bool) -> &'static str {
    if enabled {
        "ENABLED"
    } else {
        "DISABLED"
    }
}
