// ============================================================
//  ui.rs — Interface TUI avec ratatui
//
//    - En-tête + état de chargement
//    - Panneau de contrôle : fichiers, métrique, lissage, ports
//    - Graphique dB vs GHz, superposition primaire / comparaison
//    - Journal de notes
//    - Ligne de saisie / erreur, aide clavier en bas
// ============================================================

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::{
    analysis::{self, Metric, Trace, TraceSummary},
    app::{AppState, InputMode, LoadedFile, Slot},
};

// ─── Palette ──────────────────────────────────────────────────────────────────

const GREEN: Color = Color::Rgb(0, 255, 135);
const ORANGE: Color = Color::Rgb(255, 107, 53);
const CYAN: Color = Color::Rgb(0, 204, 255);
const RED: Color = Color::Rgb(255, 45, 85);
const YELLOW: Color = Color::Rgb(255, 214, 10);
const GRAY: Color = Color::Rgb(80, 80, 100);
const WHITE: Color = Color::Rgb(220, 220, 230);
const BORDER: Color = Color::Rgb(35, 35, 55);

const PRIMARY_COLOR: Color = CYAN;
const COMPARE_COLOR: Color = ORANGE;

// ─── Point d'entrée du rendu ──────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(12),   // Panneau + graphique
            Constraint::Length(3), // Saisie / statut
            Constraint::Length(2), // Aide clavier
        ])
        .split(area);

    draw_header(f, chunks[0], state);

    let center = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(38), Constraint::Min(30)])
        .split(chunks[1]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(16), Constraint::Min(4)])
        .split(center[0]);

    // Les traces sont calculées une fois par image
    let (primary, compare) = state.traces();

    draw_controls(f, left[0], state, primary.as_ref(), compare.as_ref());
    draw_notes(f, left[1], state);
    draw_chart(f, center[1], state, primary.as_ref(), compare.as_ref());
    draw_status(f, chunks[2], state);
    draw_help(f, chunks[3], state);
}

// ─── En-tête ──────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, state: &AppState) {
    let status = match state.pending_loads().as_slice() {
        [] => Span::styled("● READY", Style::default().fg(GREEN)),
        slots => {
            let what = match slots {
                [Slot::Primary] => "◌ LOADING PRIMARY",
                [Slot::Compare] => "◌ LOADING COMPARE",
                _ => "◌ LOADING PRIMARY + COMPARE",
            };
            Span::styled(what, Style::default().fg(YELLOW).add_modifier(Modifier::BOLD))
        }
    };

    let title = Line::from(vec![
        Span::styled("  SNP-Viewer  ", Style::default().fg(WHITE).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        status,
    ]);
    let subtitle = Line::from(Span::styled(
        "  Touchstone S-parameter viewer with compare overlay",
        Style::default().fg(GRAY),
    ));

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::Rgb(40, 40, 60)));

    f.render_widget(Paragraph::new(vec![title, subtitle]).block(block), area);
}

// ─── Panneau de contrôle ──────────────────────────────────────────────────────

fn file_lines(label: &str, file: Option<&LoadedFile>, color: Color) -> Vec<Line<'static>> {
    match file {
        Some(file) => {
            let mut lines = vec![
                Line::from(vec![
                    Span::styled(format!("  {label}: "), Style::default().fg(GRAY)),
                    Span::styled(file.name(), Style::default().fg(color).add_modifier(Modifier::BOLD)),
                ]),
                Line::from(Span::styled(
                    format!(
                        "    Ports: {}, Points: {}, {} {} R {}",
                        file.data.nports,
                        file.data.npoints(),
                        file.data.unit,
                        file.data.format,
                        file.data.z0
                    ),
                    Style::default().fg(GRAY),
                )),
            ];
            // Premier commentaire du fichier, souvent la description de la mesure
            if let Some(comment) = file.data.comments.iter().find(|c| !c.is_empty()) {
                lines.push(Line::from(Span::styled(
                    format!("    ! {comment}"),
                    Style::default().fg(Color::Rgb(60, 60, 80)),
                )));
            }
            lines
        }
        None => vec![Line::from(vec![
            Span::styled(format!("  {label}: "), Style::default().fg(GRAY)),
            Span::styled("(none)", Style::default().fg(GRAY)),
        ])],
    }
}

fn summary_line(label: &str, trace: Option<&Trace>, color: Color) -> Line<'static> {
    match trace.and_then(TraceSummary::of) {
        Some(s) => Line::from(vec![
            Span::styled(format!("  {label:<8}"), Style::default().fg(color)),
            Span::styled(
                format!("min {:.1}  max {:.1}  avg {:.1}", s.min_db, s.max_db, s.mean_db),
                Style::default().fg(WHITE),
            ),
        ]),
        None => Line::from(Span::styled(format!("  {label:<8}—"), Style::default().fg(GRAY))),
    }
}

fn draw_controls(
    f: &mut Frame,
    area: Rect,
    state: &AppState,
    primary: Option<&Trace>,
    compare: Option<&Trace>,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(" Plot Options ", Style::default().fg(GRAY).add_modifier(Modifier::BOLD)))
        .border_style(Style::default().fg(BORDER));

    let mut lines = file_lines("Primary", state.primary.as_ref(), PRIMARY_COLOR);
    lines.extend(file_lines("Compare", state.compare.as_ref(), COMPARE_COLOR));
    lines.push(Line::from(""));

    let metric_spans: Vec<Span> = Metric::ALL
        .iter()
        .flat_map(|&m| {
            let style = if m == state.metric {
                Style::default().fg(Color::Black).bg(CYAN).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(GRAY)
            };
            [Span::styled(format!(" {} ", m.short_name()), style), Span::raw(" ")]
        })
        .collect();
    lines.push(Line::from(
        std::iter::once(Span::styled("  Metric  ", Style::default().fg(GRAY)))
            .chain(metric_spans)
            .collect::<Vec<_>>(),
    ));

    let smooth_text = if state.smoothing {
        format!("ON (window {})", state.smooth_window)
    } else {
        "OFF".to_string()
    };
    lines.push(Line::from(vec![
        Span::styled("  Smooth  ", Style::default().fg(GRAY)),
        Span::styled(
            smooth_text,
            Style::default().fg(if state.smoothing { GREEN } else { GRAY }),
        ),
    ]));
    lines.push(Line::from(""));

    lines.push(summary_line("Primary", primary, PRIMARY_COLOR));
    if state.compare.is_some() {
        lines.push(summary_line("Compare", compare, COMPARE_COLOR));
        if let Some(stats) = primary.zip(compare).and_then(|(p, c)| analysis::compare(p, c)) {
            let color = if stats.max_abs_delta_db <= 0.5 {
                GREEN
            } else if stats.max_abs_delta_db <= 3.0 {
                YELLOW
            } else {
                RED
            };
            lines.push(Line::from(vec![
                Span::styled("  Δ       ", Style::default().fg(GRAY)),
                Span::styled(
                    format!(
                        "max {:.2} dB @ {:.3} GHz",
                        stats.max_abs_delta_db, stats.max_delta_at_ghz
                    ),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
            ]));
        }
    }

    f.render_widget(Paragraph::new(lines).block(block), area);
}

// ─── Journal ──────────────────────────────────────────────────────────────────

fn draw_notes(f: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(" Notes / Log ", Style::default().fg(GRAY)))
        .border_style(Style::default().fg(BORDER));

    // Dernières lignes visibles, la plus récente en bas
    let visible = area.height.saturating_sub(2) as usize;
    let start = state.notes.len().saturating_sub(visible);
    let last = state.notes.len().saturating_sub(1);

    let items: Vec<ListItem> = state.notes[start..]
        .iter()
        .enumerate()
        .map(|(k, note)| {
            let color = if note.starts_with("Failed") || note.starts_with("Port mismatch") {
                RED
            } else if start + k == last {
                WHITE
            } else {
                GRAY
            };
            ListItem::new(Line::from(Span::styled(format!(" {note}"), Style::default().fg(color))))
        })
        .collect();

    f.render_widget(List::new(items).block(block), area);
}

// ─── Graphique ────────────────────────────────────────────────────────────────

/// Bornes arrondies vers l'extérieur au multiple de `step`.
pub fn nice_bounds(min: f64, max: f64, step: f64) -> [f64; 2] {
    let mut lo = (min / step).floor() * step;
    let mut hi = (max / step).ceil() * step;
    if hi - lo < step {
        lo -= step / 2.0;
        hi += step / 2.0;
    }
    [lo, hi]
}

fn axis_labels(bounds: [f64; 2], count: usize, decimals: usize) -> Vec<Span<'static>> {
    (0..count)
        .map(|k| {
            let v = bounds[0] + (bounds[1] - bounds[0]) * k as f64 / (count - 1) as f64;
            Span::styled(format!("{v:.decimals$}"), Style::default().fg(GRAY))
        })
        .collect()
}

fn draw_chart(
    f: &mut Frame,
    area: Rect,
    state: &AppState,
    primary: Option<&Trace>,
    compare: Option<&Trace>,
) {
    let title = format!(" {} ", state.metric.label());
    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(title, Style::default().fg(GRAY).add_modifier(Modifier::BOLD)))
        .border_style(Style::default().fg(BORDER));

    let message = match (&state.primary, primary) {
        (None, _) => Some("Load a .sNp file to plot".to_string()),
        (Some(p), None) => Some(format!(
            "{} is not available for a {}-port file",
            state.metric.short_name(),
            p.data.nports
        )),
        _ => None,
    };
    if let Some(msg) = message {
        let para = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(format!("  {msg}"), Style::default().fg(GRAY))),
        ])
        .block(block)
        .wrap(Wrap { trim: true });
        f.render_widget(para, area);
        return;
    }

    // Pré-alloue les données pour garantir leur durée de vie >= datasets
    let primary_data: Vec<(f64, f64)> = primary.map(Trace::points).unwrap_or_default();
    let compare_data: Vec<(f64, f64)> = compare.map(Trace::points).unwrap_or_default();

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for &(x, y) in primary_data.iter().chain(&compare_data) {
        x_min = x_min.min(x);
        x_max = x_max.max(x);
        y_min = y_min.min(y);
        y_max = y_max.max(y);
    }
    if x_max <= x_min {
        x_max = x_min + 1.0;
    }
    let y_bounds = nice_bounds(y_min, y_max, 10.0);

    let name = state.metric.short_name();
    let mut datasets: Vec<Dataset> = vec![Dataset::default()
        .name(format!("Primary {name}"))
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(PRIMARY_COLOR))
        .data(&primary_data)];

    if !compare_data.is_empty() {
        datasets.push(
            Dataset::default()
                .name(format!("Compare {name}"))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(COMPARE_COLOR))
                .data(&compare_data),
        );
    }

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(Span::styled("Frequency (GHz)", Style::default().fg(GRAY)))
                .style(Style::default().fg(GRAY))
                .labels(axis_labels([x_min, x_max], 5, 2))
                .bounds([x_min, x_max]),
        )
        .y_axis(
            Axis::default()
                .title(Span::styled("Magnitude (dB)", Style::default().fg(GRAY)))
                .style(Style::default().fg(GRAY))
                .labels(axis_labels(y_bounds, 5, 0))
                .bounds(y_bounds),
        );

    f.render_widget(chart, area);
}

// ─── Saisie / erreur ──────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, state: &AppState) {
    if let InputMode::Prompt { target, buffer } = &state.input {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                format!(" {} — path, [Enter] confirm, [Esc] cancel ", target.title()),
                Style::default().fg(CYAN),
            ))
            .border_style(Style::default().fg(CYAN));
        let line = Line::from(vec![
            Span::styled(" > ", Style::default().fg(CYAN).add_modifier(Modifier::BOLD)),
            Span::styled(buffer.clone(), Style::default().fg(WHITE)),
            Span::styled("█", Style::default().fg(CYAN)),
        ]);
        f.render_widget(Paragraph::new(line).block(block), area);
        return;
    }

    if let Some(err) = &state.error {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(RED));
        let para = Paragraph::new(Span::styled(format!(" ⚠ {err}"), Style::default().fg(RED)))
            .block(block);
        f.render_widget(para, area);
        return;
    }

    let hint = match (&state.primary, &state.compare) {
        (None, _) => "  Press [O] to open a Touchstone file (.s1p, .s2p, .s4p…)",
        (Some(_), None) => "  [C] opens a second file to overlay on the primary trace",
        (Some(_), Some(_)) => "  Overlay active — [X] clears the compare file",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));
    f.render_widget(
        Paragraph::new(Span::styled(hint, Style::default().fg(GRAY))).block(block),
        area,
    );
}

// ─── Aide clavier ─────────────────────────────────────────────────────────────

fn draw_help(f: &mut Frame, area: Rect, state: &AppState) {
    let items: &[(&str, &str)] = match state.input {
        InputMode::Prompt { .. } => &[("[Enter]", "Confirm"), ("[Esc]", "Cancel")],
        InputMode::Normal => &[
            ("[O]", "Open"),
            ("[C]", "Compare"),
            ("[X]", "Clear compare"),
            ("[M/Tab]", "Metric"),
            ("[S]", "Smoothing"),
            ("[E]", "Export report"),
            ("[Q]", "Quit"),
        ],
    };

    let spans: Vec<Span> = items
        .iter()
        .flat_map(|(key, desc)| {
            vec![
                Span::styled(format!(" {key} "), Style::default().fg(CYAN).add_modifier(Modifier::BOLD)),
                Span::styled(format!("{desc} "), Style::default().fg(GRAY)),
                Span::styled(" │ ", Style::default().fg(Color::Rgb(40, 40, 55))),
            ]
        })
        .collect();

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::Rgb(35, 35, 50)));

    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::AppConfig;
    use ratatui::{backend::TestBackend, Terminal};
    use std::path::PathBuf;

    fn screen_text(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, state)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn bounds_round_outwards() {
        assert_eq!(nice_bounds(-34.2, -0.5, 10.0), [-40.0, 0.0]);
        assert_eq!(nice_bounds(-20.0, -20.0, 10.0), [-25.0, -15.0]);
    }

    #[test]
    fn empty_state_asks_for_a_file() {
        let state = AppState::new(&AppConfig::default());
        let text = screen_text(&state);
        assert!(text.contains("Load a .sNp file to plot"));
        assert!(text.contains("Primary: (none)"));
    }

    #[test]
    fn loaded_state_shows_overlay_legend() {
        let mut state = AppState::new(&AppConfig::default());
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data");
        state.load_now(Slot::Primary, &dir.join("lowpass.s2p")).unwrap();
        state.load_now(Slot::Compare, &dir.join("lowpass_rev2.s2p")).unwrap();
        let text = screen_text(&state);
        assert!(text.contains("lowpass.s2p"));
        assert!(text.contains("Primary S21"));
        assert!(text.contains("Compare S21"));
        assert!(text.contains("Frequency (GHz)"));
    }

    #[test]
    fn header_lists_every_pending_load() {
        let mut state = AppState::new(&AppConfig::default());
        assert!(screen_text(&state).contains("● READY"));

        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data");
        state.start_load(Slot::Compare, dir.join("lowpass_rev2.s2p"));
        assert!(screen_text(&state).contains("◌ LOADING COMPARE"));

        state.start_load(Slot::Primary, dir.join("lowpass.s2p"));
        assert!(screen_text(&state).contains("◌ LOADING PRIMARY + COMPARE"));
    }
}
