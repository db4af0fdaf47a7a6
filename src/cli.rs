// ============================================================
//  cli.rs — Arguments de ligne de commande
//
//  Tout est optionnel : sans argument, l'interface démarre vide
//  et les fichiers s'ouvrent depuis le TUI.
// ============================================================

use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::analysis::{Metric, DEFAULT_SMOOTH_WINDOW};

pub const DEFAULT_LOG_FILE: &str = "snp-viewer.log";

/// Terminal viewer for Touchstone S-parameter files (.sNp)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Primary Touchstone file to open at startup
    pub primary: Option<PathBuf>,

    /// Second file overlaid on the primary trace
    #[arg(short, long)]
    pub compare: Option<PathBuf>,

    /// Metric to plot: s21, s11, s12 or s22
    #[arg(short, long, default_value = "s21")]
    pub metric: Metric,

    /// Enable moving-average smoothing
    #[arg(short, long)]
    pub smooth: bool,

    /// Smoothing window in points (raised to an odd number >= 3)
    #[arg(long, default_value_t = DEFAULT_SMOOTH_WINDOW)]
    pub smooth_window: usize,

    /// Write a text report to PATH and exit without starting the UI
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Log file (the terminal is used by the UI)
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
}

/// Réglages de départ de l'application, validés.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub primary: Option<PathBuf>,
    pub compare: Option<PathBuf>,
    pub metric: Metric,
    pub smoothing: bool,
    pub smooth_window: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            primary: None,
            compare: None,
            metric: Metric::default(),
            smoothing: false,
            smooth_window: DEFAULT_SMOOTH_WINDOW,
        }
    }
}

impl Args {
    pub fn config(&self) -> Result<AppConfig> {
        if self.smooth_window == 0 {
            bail!("--smooth-window must be at least 1");
        }
        if self.compare.is_some() && self.primary.is_none() {
            bail!("--compare needs a primary file");
        }
        if self.report.is_some() && self.primary.is_none() {
            bail!("Load a primary .sNp file first.");
        }
        Ok(AppConfig {
            primary: self.primary.clone(),
            compare: self.compare.clone(),
            metric: self.metric,
            smoothing: self.smooth,
            smooth_window: self.smooth_window,
        })
    }
}
