// ============================================================
//  SNP-Viewer — Visualisation de fichiers Touchstone (.sNp)
//
//  Dépendances :
//    num-complex — S-paramètres complexes
//    ratatui     — interface TUI
//    crossterm   — terminal cross-platform
//    clap        — ligne de commande
//    tracing     — journalisation (fichier)
// ============================================================

mod analysis;
mod app;
mod cli;
mod logging;
mod report;
mod touchstone;
mod ui;

use anyhow::Result;
use app::{App, AppState, Slot};
use clap::Parser;
use cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config()?;
    logging::init(&args.log_file)?;
    tracing::info!(?config, "starting");

    // Mode sans interface : rapport puis sortie
    if let Some(report_path) = &args.report {
        let mut state = AppState::new(&config);
        if let Some(path) = &config.primary {
            state.load_now(Slot::Primary, path)?;
        }
        if let Some(path) = &config.compare {
            state.load_now(Slot::Compare, path)?;
        }
        report::export(report_path, &state.report_input())?;
        println!("Report exported: {}", report_path.display());
        return Ok(());
    }

    App::run(config)
}
