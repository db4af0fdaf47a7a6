// ============================================================
//  report.rs — Export du rapport texte
//
//  Fichiers chargés, métrique, lissage, puis résumé chiffré
//  des traces (min / max / moyenne) et de l'écart de comparaison.
// ============================================================

use anyhow::{bail, Context, Result};
use std::{fmt::Write as _, fs, path::Path};

use crate::{
    analysis::{self, Metric, TraceSummary},
    app::LoadedFile,
};

pub const DEFAULT_REPORT_NAME: &str = "snp_report.txt";

pub struct ReportInput<'a> {
    pub primary: Option<&'a LoadedFile>,
    pub compare: Option<&'a LoadedFile>,
    pub metric: Metric,
    /// Fenêtre de lissage si activé
    pub smoothing: Option<usize>,
}

pub fn render(input: &ReportInput) -> Result<String> {
    let Some(primary) = input.primary else {
        bail!("Load a primary .sNp file first.");
    };

    let mut out = String::new();
    writeln!(out, "SNP-Viewer Report")?;
    writeln!(out, "=================")?;
    writeln!(out, "Primary file: {}", primary.path.display())?;
    if let Some(cmp) = input.compare {
        writeln!(out, "Compare file: {}", cmp.path.display())?;
    }
    writeln!(out)?;
    writeln!(out, "Selected metric: {}", input.metric.label())?;
    match input.smoothing {
        Some(win) => writeln!(out, "Smoothing: ON (window {win})")?,
        None => writeln!(out, "Smoothing: OFF")?,
    }
    writeln!(out)?;

    file_line(&mut out, "Primary", primary)?;
    if let Some(cmp) = input.compare {
        file_line(&mut out, "Compare", cmp)?;
    }

    let name = input.metric.short_name();
    let primary_trace = analysis::metric_trace(&primary.data, input.metric, input.smoothing);
    let compare_trace = input
        .compare
        .and_then(|c| analysis::metric_trace(&c.data, input.metric, input.smoothing));

    match &primary_trace {
        Some(t) => summary_line(&mut out, &format!("Primary {name}"), t)?,
        None => writeln!(
            out,
            "Primary {name}: not available for {} port(s)",
            primary.data.nports
        )?,
    }
    if let Some(t) = &compare_trace {
        summary_line(&mut out, &format!("Compare {name}"), t)?;
    }

    if let (Some(p), Some(c)) = (&primary_trace, &compare_trace) {
        match analysis::compare(p, c) {
            Some(stats) => writeln!(
                out,
                "Delta: mean |Δ| {:.2} dB, max |Δ| {:.2} dB @ {:.4} GHz over {} points",
                stats.mean_abs_delta_db,
                stats.max_abs_delta_db,
                stats.max_delta_at_ghz,
                stats.points
            )?,
            None => writeln!(out, "Delta: no overlapping frequency range")?,
        }
    }

    Ok(out.trim_end().to_string())
}

fn file_line(out: &mut String, label: &str, file: &LoadedFile) -> Result<()> {
    let f = &file.data.freq_hz;
    let (lo, hi) = match (f.first(), f.last()) {
        (Some(lo), Some(hi)) => (lo / 1e9, hi / 1e9),
        _ => (0.0, 0.0),
    };
    writeln!(
        out,
        "{label}: {} ports, {} points, {:.4}–{:.4} GHz, {} R {}",
        file.data.nports,
        file.data.npoints(),
        lo,
        hi,
        file.data.format,
        file.data.z0
    )?;
    Ok(())
}

fn summary_line(out: &mut String, label: &str, trace: &analysis::Trace) -> Result<()> {
    if let Some(s) = TraceSummary::of(trace) {
        writeln!(
            out,
            "{label}: min {:.2} dB @ {:.4} GHz, max {:.2} dB @ {:.4} GHz, mean {:.2} dB",
            s.min_db, s.min_at_ghz, s.max_db, s.max_at_ghz, s.mean_db
        )?;
    }
    Ok(())
}

pub fn export(path: &Path, input: &ReportInput) -> Result<()> {
    let text = render(input)?;
    fs::write(path, text).with_context(|| format!("writing report to {}", path.display()))?;
    tracing::info!(path = %path.display(), "report exported");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touchstone::read_touchstone;
    use std::path::PathBuf;

    fn load(name: &str) -> LoadedFile {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/data")
            .join(name);
        let data = read_touchstone(&path).unwrap();
        LoadedFile { path, data }
    }

    #[test]
    fn primary_only_report() {
        let primary = load("lowpass.s2p");
        let text = render(&ReportInput {
            primary: Some(&primary),
            compare: None,
            metric: Metric::S21,
            smoothing: None,
        })
        .unwrap();

        assert!(text.starts_with("SNP-Viewer Report\n================="));
        assert!(text.contains("lowpass.s2p"));
        assert!(!text.contains("Compare file:"));
        assert!(text.contains("Selected metric: S21 (Insertion Loss) [dB]"));
        assert!(text.contains("Smoothing: OFF"));
        assert!(text.contains("Primary: 2 ports, 5 points, 1.0000–5.0000 GHz, DB R 50"));
        assert!(text.contains("Primary S21: min -35.00 dB @ 5.0000 GHz, max -0.50 dB @ 1.0000 GHz"));
        assert!(!text.contains("Delta:"));
    }

    #[test]
    fn compare_report_has_delta() {
        let primary = load("lowpass.s2p");
        let compare = load("lowpass_rev2.s2p");
        let text = render(&ReportInput {
            primary: Some(&primary),
            compare: Some(&compare),
            metric: Metric::S11,
            smoothing: Some(7),
        })
        .unwrap();

        assert!(text.contains("Compare file:"));
        assert!(text.contains("lowpass_rev2.s2p"));
        assert!(text.contains("Smoothing: ON (window 7)"));
        assert!(text.contains("Compare S11:"));
        assert!(text.contains("Delta: mean |Δ|"));
    }

    #[test]
    fn file_lines_follow_header_in_order() {
        let primary = load("lowpass.s2p");
        let compare = load("lowpass_rev2.s2p");
        let text = render(&ReportInput {
            primary: Some(&primary),
            compare: Some(&compare),
            metric: Metric::S21,
            smoothing: Some(5),
        })
        .unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[5], "Selected metric: S21 (Insertion Loss) [dB]");
        assert_eq!(lines[6], "Smoothing: ON (window 5)");
        assert_eq!(lines[7], "");
        assert_eq!(lines[8], "Primary: 2 ports, 5 points, 1.0000–5.0000 GHz, DB R 50");
        assert_eq!(lines[9], "Compare: 2 ports, 4 points, 1.0000–4.5000 GHz, RI R 50");
        assert!(lines[10].starts_with("Primary S21: min "));
        assert!(lines[11].starts_with("Compare S21: min "));
        assert!(lines[12].starts_with("Delta: mean |Δ| "));
        assert_eq!(lines.len(), 13);
    }

    #[test]
    fn metric_missing_for_one_port() {
        let primary = load("antenna.s1p");
        let text = render(&ReportInput {
            primary: Some(&primary),
            compare: None,
            metric: Metric::S21,
            smoothing: None,
        })
        .unwrap();
        assert!(text.contains("Primary S21: not available for 1 port(s)"));
    }

    #[test]
    fn export_requires_primary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.txt");
        let err = export(
            &path,
            &ReportInput {
                primary: None,
                compare: None,
                metric: Metric::S21,
                smoothing: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Load a primary .sNp file first.");
        assert!(!path.exists());
    }

    #[test]
    fn export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_REPORT_NAME);
        let primary = load("antenna.s1p");
        export(
            &path,
            &ReportInput {
                primary: Some(&primary),
                compare: None,
                metric: Metric::S11,
                smoothing: None,
            },
        )
        .unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Primary S11: min -20.00 dB @ 2.4500 GHz"));
    }
}
