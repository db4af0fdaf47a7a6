// ============================================================
//  logging.rs — Journalisation tracing vers fichier
//
//  Le terminal appartient à l'interface : les traces partent dans
//  un fichier. Filtre via la variable SNP_VIEWER_LOG (défaut : info).
// ============================================================

use anyhow::{Context, Result};
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SNP_VIEWER_LOG";

pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("opening log file {}", log_file.display()))?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    tracing::info!(file = %log_file.display(), "logging started");
    Ok(())
}
