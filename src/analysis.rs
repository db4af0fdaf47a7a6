// ============================================================
//  analysis.rs — Traitement des S-paramètres
//
//  - Conversion en dB (plancher 1e-20 pour éviter -inf)
//  - Lissage par moyenne glissante
//  - Extraction d'une trace S(i,j) en dB vs GHz
//  - Statistiques de trace et comparaison primaire / comparaison
// ============================================================

use num_complex::Complex64;

use crate::touchstone::TouchstoneData;

pub const MAG_FLOOR: f64 = 1e-20;
pub const DEFAULT_SMOOTH_WINDOW: usize = 7;

// ─── Métriques ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    S21,
    S11,
    S12,
    S22,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::S21, Metric::S11, Metric::S12, Metric::S22];

    pub fn label(self) -> &'static str {
        match self {
            Metric::S21 => "S21 (Insertion Loss) [dB]",
            Metric::S11 => "S11 (Return Loss) [dB]",
            Metric::S12 => "S12 [dB]",
            Metric::S22 => "S22 [dB]",
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            Metric::S21 => "S21",
            Metric::S11 => "S11",
            Metric::S12 => "S12",
            Metric::S22 => "S22",
        }
    }

    /// Indices (i, j) à partir de 0. Au-delà de 2 ports, seuls les deux
    /// premiers ports sont tracés.
    pub fn indices(self, nports: usize) -> Option<(usize, usize)> {
        let (ij, min_ports) = match self {
            Metric::S21 => ((1, 0), 2),
            Metric::S11 => ((0, 0), 1),
            Metric::S12 => ((0, 1), 2),
            Metric::S22 => ((1, 1), 2),
        };
        (nports >= min_ports).then_some(ij)
    }

    pub fn next(self) -> Self {
        match self {
            Metric::S21 => Metric::S11,
            Metric::S11 => Metric::S12,
            Metric::S12 => Metric::S22,
            Metric::S22 => Metric::S21,
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s21" => Ok(Metric::S21),
            "s11" => Ok(Metric::S11),
            "s12" => Ok(Metric::S12),
            "s22" => Ok(Metric::S22),
            other => Err(format!("unknown metric '{other}' (expected s21, s11, s12 or s22)")),
        }
    }
}

// ─── Conversion en dB ────────────────────────────────────────────────────────

pub fn sparam_db(s: &[Complex64]) -> Vec<f64> {
    s.iter()
        .map(|z| 20.0 * z.norm().max(MAG_FLOOR).log10())
        .collect()
}

// ─── Lissage (moyenne glissante centrée) ─────────────────────────────────────
//
// Équivalent d'une convolution "same" avec un noyau uniforme : aux bords,
// les échantillons manquants comptent pour zéro.

pub fn smooth(y: &[f64], window: usize) -> Vec<f64> {
    let mut win = window.max(3);
    if win % 2 == 0 {
        win += 1;
    }
    if y.len() < win {
        return y.to_vec();
    }

    let half = win / 2;
    let n = y.len();
    (0..n)
        .map(|k| {
            let lo = k.saturating_sub(half);
            let hi = (k + half).min(n - 1);
            y[lo..=hi].iter().sum::<f64>() / win as f64
        })
        .collect()
}

// ─── Traces ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub x_ghz: Vec<f64>,
    pub y_db: Vec<f64>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.x_ghz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x_ghz.is_empty()
    }

    pub fn points(&self) -> Vec<(f64, f64)> {
        self.x_ghz
            .iter()
            .copied()
            .zip(self.y_db.iter().copied())
            .collect()
    }

    /// Interpolation linéaire ; `None` hors de la plage de fréquences.
    pub fn value_at(&self, x: f64) -> Option<f64> {
        let xs = &self.x_ghz;
        if xs.is_empty() || x < xs[0] || x > xs[xs.len() - 1] {
            return None;
        }
        let k = xs.partition_point(|&v| v < x);
        if k < xs.len() && xs[k] == x {
            return Some(self.y_db[k]);
        }
        // k >= 1 ici car x > xs[0]
        let (x0, x1) = (xs[k - 1], xs[k]);
        let (y0, y1) = (self.y_db[k - 1], self.y_db[k]);
        Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
    }
}

pub fn extract_db(data: &TouchstoneData, i: usize, j: usize) -> Trace {
    Trace {
        x_ghz: data.freq_hz.iter().map(|f| f / 1e9).collect(),
        y_db: sparam_db(&data.series(i, j)),
    }
}

/// Trace d'une métrique, lissée si `smoothing` donne une fenêtre.
pub fn metric_trace(data: &TouchstoneData, metric: Metric, smoothing: Option<usize>) -> Option<Trace> {
    let (i, j) = metric.indices(data.nports)?;
    let mut trace = extract_db(data, i, j);
    if let Some(win) = smoothing {
        trace.y_db = smooth(&trace.y_db, win);
    }
    Some(trace)
}

// ─── Statistiques ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSummary {
    pub min_db: f64,
    pub min_at_ghz: f64,
    pub max_db: f64,
    pub max_at_ghz: f64,
    pub mean_db: f64,
}

impl TraceSummary {
    pub fn of(trace: &Trace) -> Option<Self> {
        if trace.is_empty() {
            return None;
        }
        let mut s = TraceSummary {
            min_db: f64::INFINITY,
            min_at_ghz: 0.0,
            max_db: f64::NEG_INFINITY,
            max_at_ghz: 0.0,
            mean_db: 0.0,
        };
        for (&x, &y) in trace.x_ghz.iter().zip(&trace.y_db) {
            if y < s.min_db {
                s.min_db = y;
                s.min_at_ghz = x;
            }
            if y > s.max_db {
                s.max_db = y;
                s.max_at_ghz = x;
            }
            s.mean_db += y;
        }
        s.mean_db /= trace.len() as f64;
        Some(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompareStats {
    pub points: usize,
    pub mean_abs_delta_db: f64,
    pub max_abs_delta_db: f64,
    pub max_delta_at_ghz: f64,
}

/// Écart |primaire − comparaison| sur la grille de fréquences primaire,
/// limité à la plage commune.
pub fn compare(primary: &Trace, other: &Trace) -> Option<CompareStats> {
    let deltas: Vec<(f64, f64)> = primary
        .x_ghz
        .iter()
        .zip(&primary.y_db)
        .filter_map(|(&x, &y)| other.value_at(x).map(|y2| (x, (y - y2).abs())))
        .collect();

    if deltas.is_empty() {
        return None;
    }

    let (max_at, max_delta) = deltas
        .iter()
        .copied()
        .fold((0.0, f64::NEG_INFINITY), |acc, (x, d)| if d > acc.1 { (x, d) } else { acc });
    let mean = deltas.iter().map(|(_, d)| d).sum::<f64>() / deltas.len() as f64;

    Some(CompareStats {
        points: deltas.len(),
        mean_abs_delta_db: mean,
        max_abs_delta_db: max_delta,
        max_delta_at_ghz: max_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::touchstone::parse_str;
    use approx::assert_relative_eq;

    fn trace(x: &[f64], y: &[f64]) -> Trace {
        Trace {
            x_ghz: x.to_vec(),
            y_db: y.to_vec(),
        }
    }

    #[test]
    fn db_of_known_magnitudes() {
        let db = sparam_db(&[
            Complex64::new(0.1, 0.0),
            Complex64::new(0.0, 1.0),
            Complex64::new(0.0, 0.0),
        ]);
        assert_relative_eq!(db[0], -20.0, epsilon = 1e-12);
        assert_relative_eq!(db[1], 0.0, epsilon = 1e-12);
        assert!(db[2].is_finite());
        assert_relative_eq!(db[2], -400.0, epsilon = 1e-9);
    }

    #[test]
    fn smoothing_keeps_length_and_flat_interior() {
        let y = vec![2.0; 20];
        let out = smooth(&y, 7);
        assert_eq!(out.len(), 20);
        for v in &out[3..17] {
            assert_relative_eq!(*v, 2.0, epsilon = 1e-12);
        }
        // Bord : 4 échantillons sur 7
        assert_relative_eq!(out[0], 2.0 * 4.0 / 7.0, epsilon = 1e-12);
    }

    #[test]
    fn smoothing_window_is_made_odd_and_at_least_three() {
        let y: Vec<f64> = (0..10).map(|v| v as f64).collect();
        assert_eq!(smooth(&y, 4), smooth(&y, 5));
        assert_eq!(smooth(&y, 1), smooth(&y, 3));
    }

    #[test]
    fn short_input_is_returned_unchanged() {
        let y = vec![1.0, 5.0, 3.0];
        assert_eq!(smooth(&y, 7), y);
    }

    #[test]
    fn metric_indices_depend_on_port_count() {
        assert_eq!(Metric::S21.indices(2), Some((1, 0)));
        assert_eq!(Metric::S12.indices(4), Some((0, 1)));
        assert_eq!(Metric::S11.indices(1), Some((0, 0)));
        assert_eq!(Metric::S22.indices(1), None);
        assert_eq!(Metric::S21.indices(1), None);
    }

    #[test]
    fn metric_cycle_wraps() {
        let mut m = Metric::S21;
        for _ in 0..Metric::ALL.len() {
            m = m.next();
        }
        assert_eq!(m, Metric::S21);
        assert_eq!("S22".parse::<Metric>(), Ok(Metric::S22));
        assert!("s33".parse::<Metric>().is_err());
    }

    #[test]
    fn metric_trace_converts_to_ghz_and_db() {
        let data = parse_str("# MHZ S RI\n500 0.1 0 1 0 0 0 0.5 0\n", 2).unwrap();
        let s21 = metric_trace(&data, Metric::S21, None).unwrap();
        assert_relative_eq!(s21.x_ghz[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(s21.y_db[0], 0.0, epsilon = 1e-12);
        let s11 = metric_trace(&data, Metric::S11, None).unwrap();
        assert_relative_eq!(s11.y_db[0], -20.0, epsilon = 1e-12);
        // S12 = 0 → plancher
        let s12 = metric_trace(&data, Metric::S12, Some(7)).unwrap();
        assert_relative_eq!(s12.y_db[0], -400.0, epsilon = 1e-9);
    }

    #[test]
    fn summary_finds_extremes() {
        let t = trace(&[1.0, 2.0, 3.0, 4.0], &[-1.0, -3.0, -0.5, -2.5]);
        let s = TraceSummary::of(&t).unwrap();
        assert_eq!(s.min_db, -3.0);
        assert_eq!(s.min_at_ghz, 2.0);
        assert_eq!(s.max_db, -0.5);
        assert_eq!(s.max_at_ghz, 3.0);
        assert_relative_eq!(s.mean_db, -1.75, epsilon = 1e-12);
        assert!(TraceSummary::of(&trace(&[], &[])).is_none());
    }

    #[test]
    fn interpolation_inside_and_outside_range() {
        let t = trace(&[1.0, 2.0, 4.0], &[0.0, -10.0, -30.0]);
        assert_eq!(t.value_at(1.0), Some(0.0));
        assert_eq!(t.value_at(4.0), Some(-30.0));
        assert_relative_eq!(t.value_at(1.5).unwrap(), -5.0, epsilon = 1e-12);
        assert_relative_eq!(t.value_at(3.0).unwrap(), -20.0, epsilon = 1e-12);
        assert_eq!(t.value_at(0.5), None);
        assert_eq!(t.value_at(4.5), None);
    }

    #[test]
    fn compare_over_overlapping_band() {
        let a = trace(&[1.0, 2.0, 3.0, 5.0], &[-1.0, -2.0, -3.0, -5.0]);
        let b = trace(&[2.0, 4.0], &[-1.0, -5.0]);
        let stats = compare(&a, &b).unwrap();
        // Recouvrement : 2 et 3 GHz
        assert_eq!(stats.points, 2);
        assert_relative_eq!(stats.max_abs_delta_db, 1.0, epsilon = 1e-12);
        assert_eq!(stats.max_delta_at_ghz, 2.0);
        assert_relative_eq!(stats.mean_abs_delta_db, 0.5, epsilon = 1e-12);

        let far = trace(&[10.0, 11.0], &[0.0, 0.0]);
        assert!(compare(&a, &far).is_none());
    }
}
