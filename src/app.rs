// ============================================================
//  app.rs — Machine d'état de l'application
//
//  Fichier primaire + fichier de comparaison, métrique, lissage,
//  saisie de chemin, journal de notes.
//  Les chargements tournent dans un thread et remontent par canal.
// ============================================================

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    path::{Path, PathBuf},
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use crate::{
    analysis::{self, Metric, Trace},
    cli::AppConfig,
    report::{self, ReportInput, DEFAULT_REPORT_NAME},
    touchstone::{read_touchstone, TouchstoneData},
    ui,
};

const MAX_NOTES: usize = 500;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub data: TouchstoneData,
}

impl LoadedFile {
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Primary,
    Compare,
}

impl Slot {
    fn label(self) -> &'static str {
        match self {
            Slot::Primary => "primary",
            Slot::Compare => "compare",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTarget {
    Open(Slot),
    ExportReport,
}

impl PromptTarget {
    pub fn title(self) -> &'static str {
        match self {
            PromptTarget::Open(Slot::Primary) => "Open .sNp",
            PromptTarget::Open(Slot::Compare) => "Open Compare .sNp",
            PromptTarget::ExportReport => "Export Report",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Prompt { target: PromptTarget, buffer: String },
}

// Message envoyé par le thread de chargement vers la boucle principale
pub enum LoadMsg {
    Loaded(Slot, LoadedFile),
    Failed(Slot, PathBuf, String),
}

/// Chargement en cours pour un emplacement.
pub struct Loader {
    pub path: PathBuf,
    rx: mpsc::Receiver<LoadMsg>,
}

/// Ce que la boucle principale doit faire après une touche.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

pub struct AppState {
    pub primary: Option<LoadedFile>,
    pub compare: Option<LoadedFile>,

    pub metric: Metric,
    pub smoothing: bool,
    pub smooth_window: usize,

    pub input: InputMode,
    pub error: Option<String>,
    pub notes: Vec<String>,

    // Un canal par emplacement : primaire et comparaison se chargent en parallèle
    pub primary_load: Option<Loader>,
    pub compare_load: Option<Loader>,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Self {
        let mut state = AppState {
            primary: None,
            compare: None,
            metric: config.metric,
            smoothing: config.smoothing,
            smooth_window: config.smooth_window,
            input: InputMode::Normal,
            error: None,
            notes: Vec::new(),
            primary_load: None,
            compare_load: None,
        };
        state.log("Ready. Open a Touchstone file (.s2p/.sNp) to begin.");
        state
    }

    pub fn log(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(target: "notes", "{msg}");
        self.notes.push(msg);
        if self.notes.len() > MAX_NOTES {
            self.notes.remove(0);
        }
    }

    pub fn smoothing_window(&self) -> Option<usize> {
        self.smoothing.then_some(self.smooth_window)
    }

    // ─── Chargement ──────────────────────────────────────────────────────────

    fn loader_mut(&mut self, slot: Slot) -> &mut Option<Loader> {
        match slot {
            Slot::Primary => &mut self.primary_load,
            Slot::Compare => &mut self.compare_load,
        }
    }

    /// Emplacements dont le chargement n'est pas terminé.
    pub fn pending_loads(&self) -> Vec<Slot> {
        let mut slots = Vec::new();
        if self.primary_load.is_some() {
            slots.push(Slot::Primary);
        }
        if self.compare_load.is_some() {
            slots.push(Slot::Compare);
        }
        slots
    }

    pub fn is_loading(&self) -> bool {
        self.primary_load.is_some() || self.compare_load.is_some()
    }

    /// Lance la lecture du fichier dans un thread séparé.
    /// Un chargement en cours sur le même emplacement est abandonné au profit du nouveau.
    pub fn start_load(&mut self, slot: Slot, path: PathBuf) {
        let (tx, rx) = mpsc::channel::<LoadMsg>();
        *self.loader_mut(slot) = Some(Loader { path: path.clone(), rx });
        self.error = None;

        tracing::debug!(slot = slot.label(), path = %path.display(), "load started");
        thread::spawn(move || {
            let msg = match read_touchstone(&path) {
                Ok(data) => LoadMsg::Loaded(slot, LoadedFile { path, data }),
                Err(e) => LoadMsg::Failed(slot, path, e.to_string()),
            };
            let _ = tx.send(msg);
        });
    }

    /// Dépile les messages des threads de chargement, s'il y en a.
    pub fn poll_loader(&mut self) {
        for slot in [Slot::Primary, Slot::Compare] {
            let msg = match self.loader_mut(slot) {
                Some(loader) => match loader.rx.try_recv() {
                    Ok(msg) => Some(msg),
                    Err(mpsc::TryRecvError::Empty) => continue,
                    Err(mpsc::TryRecvError::Disconnected) => None,
                },
                None => continue,
            };
            if let Some(loader) = self.loader_mut(slot).take() {
                self.apply_load(loader, msg);
            }
        }
    }

    fn apply_load(&mut self, loader: Loader, msg: Option<LoadMsg>) {
        match msg {
            Some(LoadMsg::Loaded(Slot::Primary, file)) => self.install_primary(file),
            Some(LoadMsg::Loaded(Slot::Compare, file)) => self.install_compare(file),
            Some(LoadMsg::Failed(slot, path, err)) => {
                tracing::warn!(slot = slot.label(), path = %path.display(), error = %err, "load failed");
                let msg = format!("Failed to read file: {}: {}", path.display(), err);
                self.log(msg.clone());
                self.error = Some(msg);
            }
            None => {
                self.error = Some(format!(
                    "Loader thread stopped unexpectedly: {}",
                    loader.path.display()
                ));
            }
        }
    }

    /// Chargement synchrone (démarrage et mode rapport).
    pub fn load_now(&mut self, slot: Slot, path: &Path) -> Result<()> {
        let data = read_touchstone(path)
            .map_err(|e| anyhow::anyhow!("Failed to read file: {}: {}", path.display(), e))?;
        let file = LoadedFile {
            path: path.to_path_buf(),
            data,
        };
        match slot {
            Slot::Primary => self.install_primary(file),
            Slot::Compare => self.install_compare(file),
        }
        Ok(())
    }

    pub fn install_primary(&mut self, file: LoadedFile) {
        self.log(format!(
            "Loaded primary: {}  (ports={}, points={})",
            file.path.display(),
            file.data.nports,
            file.data.npoints()
        ));
        self.primary = Some(file);
        self.check_metric();
    }

    pub fn install_compare(&mut self, file: LoadedFile) {
        let nports = file.data.nports;
        if let Some(primary) = &self.primary {
            if primary.data.nports != file.data.nports {
                let msg = format!(
                    "Port mismatch: compare file ports ({}) != primary ports ({}). \
                     Overlay still plots matching indices, but interpretation may be invalid.",
                    file.data.nports, primary.data.nports
                );
                tracing::warn!("{msg}");
                self.log(msg);
            }
        }
        self.log(format!(
            "Loaded compare: {}  (ports={}, points={})",
            file.path.display(),
            file.data.nports,
            file.data.npoints()
        ));
        self.compare = Some(file);
        if self.metric.indices(nports).is_none() {
            self.log(format!(
                "Unsupported metric selection for compare: {} ({} port(s))",
                self.metric.label(),
                nports
            ));
        }
    }

    pub fn clear_compare(&mut self) {
        self.compare = None;
        self.log("Compare file cleared.");
    }

    // ─── Options de tracé ────────────────────────────────────────────────────

    pub fn cycle_metric(&mut self) {
        self.metric = self.metric.next();
        self.check_metric();
    }

    pub fn toggle_smoothing(&mut self) {
        self.smoothing = !self.smoothing;
        self.log(format!(
            "Smoothing {}",
            if self.smoothing { "ON" } else { "OFF" }
        ));
    }

    fn check_metric(&mut self) {
        let checks = [
            ("", self.primary.as_ref().map(|p| p.data.nports)),
            (" for compare", self.compare.as_ref().map(|c| c.data.nports)),
        ];
        for (which, nports) in checks {
            let Some(nports) = nports else { continue };
            if self.metric.indices(nports).is_none() {
                self.log(format!(
                    "Unsupported metric selection{which}: {} ({} port(s))",
                    self.metric.label(),
                    nports
                ));
            }
        }
    }

    /// Traces à afficher : (primaire, comparaison).
    pub fn traces(&self) -> (Option<Trace>, Option<Trace>) {
        let win = self.smoothing_window();
        let primary = self
            .primary
            .as_ref()
            .and_then(|p| analysis::metric_trace(&p.data, self.metric, win));
        let compare = self
            .compare
            .as_ref()
            .and_then(|c| analysis::metric_trace(&c.data, self.metric, win));
        (primary, compare)
    }

    // ─── Rapport ─────────────────────────────────────────────────────────────

    pub fn report_input(&self) -> ReportInput<'_> {
        ReportInput {
            primary: self.primary.as_ref(),
            compare: self.compare.as_ref(),
            metric: self.metric,
            smoothing: self.smoothing_window(),
        }
    }

    pub fn export_report(&mut self, path: &Path) {
        match report::export(path, &self.report_input()) {
            Ok(()) => {
                self.error = None;
                self.log(format!("Report exported: {}", path.display()));
            }
            Err(e) => {
                let msg = format!("{e:#}");
                self.log(format!("Export Report: {msg}"));
                self.error = Some(msg);
            }
        }
    }

    // ─── Clavier ─────────────────────────────────────────────────────────────

    pub fn open_prompt(&mut self, target: PromptTarget) {
        let buffer = match target {
            PromptTarget::ExportReport => DEFAULT_REPORT_NAME.to_string(),
            PromptTarget::Open(_) => String::new(),
        };
        self.input = InputMode::Prompt { target, buffer };
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if let (KeyCode::Char('c'), true) = (key.code, key.modifiers.contains(KeyModifiers::CONTROL)) {
            return Action::Quit;
        }

        if let InputMode::Prompt { target, buffer } = &mut self.input {
            match key.code {
                KeyCode::Esc => self.input = InputMode::Normal,
                KeyCode::Enter => {
                    let target = *target;
                    let text = buffer.trim().to_string();
                    self.input = InputMode::Normal;
                    if !text.is_empty() {
                        self.submit_prompt(target, PathBuf::from(text));
                    }
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) => buffer.push(c),
                _ => {}
            }
            return Action::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Action::Quit,

            KeyCode::Char('o') | KeyCode::Char('O') => self.open_prompt(PromptTarget::Open(Slot::Primary)),
            KeyCode::Char('c') | KeyCode::Char('C') => self.open_prompt(PromptTarget::Open(Slot::Compare)),
            KeyCode::Char('x') | KeyCode::Char('X') | KeyCode::Delete => self.clear_compare(),

            KeyCode::Char('m') | KeyCode::Char('M') | KeyCode::Tab => self.cycle_metric(),
            KeyCode::Char('s') | KeyCode::Char('S') => self.toggle_smoothing(),

            KeyCode::Char('e') | KeyCode::Char('E') => {
                if self.primary.is_some() {
                    self.open_prompt(PromptTarget::ExportReport);
                } else {
                    let msg = "Load a primary .sNp file first.";
                    self.log(format!("Export Report: {msg}"));
                    self.error = Some(msg.to_string());
                }
            }

            // Efface le message d'erreur affiché
            KeyCode::Esc => self.error = None,

            _ => {}
        }
        Action::Continue
    }

    fn submit_prompt(&mut self, target: PromptTarget, path: PathBuf) {
        match target {
            PromptTarget::Open(slot) => self.start_load(slot, path),
            PromptTarget::ExportReport => self.export_report(&path),
        }
    }
}

// ─── Point d'entrée ───────────────────────────────────────────────────────────

pub struct App;

impl App {
    pub fn run(config: AppConfig) -> Result<()> {
        let mut state = AppState::new(&config);

        // Fichiers passés en ligne de commande : une erreur n'empêche pas le démarrage
        if let Some(path) = &config.primary {
            if let Err(e) = state.load_now(Slot::Primary, path) {
                state.log(e.to_string());
                state.error = Some(e.to_string());
            }
        }
        if let Some(path) = &config.compare {
            if let Err(e) = state.load_now(Slot::Compare, path) {
                state.log(e.to_string());
                state.error = Some(e.to_string());
            }
        }

        // Init terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = Self::event_loop(&mut terminal, &mut state);

        // Restaure le terminal, même après une erreur
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        result
    }

    fn event_loop(
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        state: &mut AppState,
    ) -> Result<()> {
        let tick = Duration::from_millis(50);
        let mut last_tick = Instant::now();

        loop {
            state.poll_loader();

            terminal.draw(|f| ui::draw(f, state))?;

            let timeout = tick.checked_sub(last_tick.elapsed()).unwrap_or_default();
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && state.handle_key(key) == Action::Quit {
                        break;
                    }
                }
            }

            if last_tick.elapsed() >= tick {
                last_tick = Instant::now();
            }
        }
        tracing::info!("exiting");
        Ok(())
    }
}
