// ============================================================
//  touchstone.rs — Lecture des fichiers Touchstone (.sNp)
//
//  - Nombre de ports déduit du nom de fichier (.s2p, .s16p…)
//  - Ligne d'options : unité (Hz/kHz/MHz/GHz), format (RI/MA/DB), R <z0>
//  - Mots-clés Touchstone 2.0 courants ([Number of Ports], [Network Data]…)
//  - Points de fréquence répartis sur plusieurs lignes
// ============================================================

use num_complex::Complex64;
use std::{
    fs,
    ops::{Index, IndexMut},
    path::Path,
};
use thiserror::Error;

pub const DEFAULT_Z0: f64 = 50.0;

/// Au-delà, le fichier est refusé (taille d'un point en nports²).
pub const MAX_PORTS: usize = 256;

// ─── Erreurs ──────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum TouchstoneError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to infer port count from filename: {0}")]
    PortCount(String),

    #[error("Not enough numeric data found ({found} values, {needed} needed per point). Is this a valid .sNp file?")]
    NotEnoughData { found: usize, needed: usize },

    #[error("Invalid keyword line: {0}")]
    InvalidKeyword(String),
}

// ─── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrequencyUnit {
    #[default]
    Hz,
    KHz,
    MHz,
    GHz,
}

impl FrequencyUnit {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "HZ" => Some(FrequencyUnit::Hz),
            "KHZ" => Some(FrequencyUnit::KHz),
            "MHZ" => Some(FrequencyUnit::MHz),
            "GHZ" => Some(FrequencyUnit::GHz),
            _ => None,
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            FrequencyUnit::Hz => 1.0,
            FrequencyUnit::KHz => 1e3,
            FrequencyUnit::MHz => 1e6,
            FrequencyUnit::GHz => 1e9,
        }
    }
}

impl std::fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FrequencyUnit::Hz => "Hz",
            FrequencyUnit::KHz => "kHz",
            FrequencyUnit::MHz => "MHz",
            FrequencyUnit::GHz => "GHz",
        };
        f.write_str(s)
    }
}

/// Format des paires de valeurs d'un point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    #[default]
    RI, // Réel / imaginaire
    MA, // Module linéaire / angle (degrés)
    DB, // Module dB / angle (degrés)
}

impl DataFormat {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "RI" => Some(DataFormat::RI),
            "MA" => Some(DataFormat::MA),
            "DB" => Some(DataFormat::DB),
            _ => None,
        }
    }

    pub fn to_complex(self, a: f64, b: f64) -> Complex64 {
        match self {
            DataFormat::RI => Complex64::new(a, b),
            DataFormat::MA => Complex64::from_polar(a, b.to_radians()),
            DataFormat::DB => Complex64::from_polar(10f64.powf(a / 20.0), b.to_radians()),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataFormat::RI => "RI",
            DataFormat::MA => "MA",
            DataFormat::DB => "DB",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionLine {
    pub unit: FrequencyUnit,
    pub format: DataFormat,
    pub z0: f64,
}

impl Default for OptionLine {
    fn default() -> Self {
        OptionLine {
            unit: FrequencyUnit::Hz,
            format: DataFormat::RI,
            z0: DEFAULT_Z0,
        }
    }
}

impl OptionLine {
    /// Analyse une ligne du type `# GHZ S RI R 50`.
    /// Les jetons inconnus (type de paramètre inclus) sont ignorés.
    pub fn parse(line: &str) -> Self {
        let mut opts = OptionLine::default();
        let parts: Vec<&str> = line.trim_start_matches('#').split_whitespace().collect();

        let mut i = 0;
        while i < parts.len() {
            let part = parts[i];
            if let Some(unit) = FrequencyUnit::parse(part) {
                opts.unit = unit;
            } else if let Some(format) = DataFormat::parse(part) {
                opts.format = format;
            } else if part.eq_ignore_ascii_case("R") {
                if let Some(z0) = parts.get(i + 1).and_then(|v| v.parse::<f64>().ok()) {
                    opts.z0 = z0;
                    i += 1;
                }
            }
            i += 1;
        }
        opts
    }
}

// ─── Matrice S ────────────────────────────────────────────────────────────────

/// Matrice carrée complexe stockée ligne par ligne.
#[derive(Debug, Clone, PartialEq)]
pub struct SMatrix {
    n: usize,
    data: Vec<Complex64>,
}

impl SMatrix {
    pub fn zeros(n: usize) -> Self {
        SMatrix {
            n,
            data: vec![Complex64::new(0.0, 0.0); n * n],
        }
    }
}

impl Index<(usize, usize)> for SMatrix {
    type Output = Complex64;

    fn index(&self, (i, j): (usize, usize)) -> &Complex64 {
        &self.data[i * self.n + j]
    }
}

impl IndexMut<(usize, usize)> for SMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Complex64 {
        &mut self.data[i * self.n + j]
    }
}

// ─── Données lues ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TouchstoneData {
    /// Fréquences en Hz
    pub freq_hz: Vec<f64>,
    /// Une matrice `nports × nports` par fréquence
    pub s: Vec<SMatrix>,
    pub nports: usize,
    pub format: DataFormat,
    pub unit: FrequencyUnit,
    /// Impédance de référence (ohm)
    pub z0: f64,
    pub comments: Vec<String>,
}

impl TouchstoneData {
    pub fn npoints(&self) -> usize {
        self.freq_hz.len()
    }

    /// Série complexe S(i,j) sur toutes les fréquences (indices à partir de 0).
    pub fn series(&self, i: usize, j: usize) -> Vec<Complex64> {
        self.s.iter().map(|m| m[(i, j)]).collect()
    }
}

// ─── Point d'entrée ───────────────────────────────────────────────────────────

pub fn read_touchstone(path: &Path) -> Result<TouchstoneData, TouchstoneError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let nports = infer_nports(&name).ok_or_else(|| TouchstoneError::PortCount(name.clone()))?;

    // Décodage tolérant : les octets invalides ne font pas échouer la lecture
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);

    let data = parse_str(&text, nports)?;
    tracing::debug!(
        file = %name,
        nports = data.nports,
        points = data.npoints(),
        format = %data.format,
        "touchstone file parsed"
    );
    Ok(data)
}

/// Déduit le nombre de ports de l'extension `.sNp` (insensible à la casse).
pub fn infer_nports(filename: &str) -> Option<usize> {
    let lower = filename.to_ascii_lowercase();
    let (_, ext) = lower.rsplit_once(".s")?;
    let n = ext.strip_suffix('p')?.parse::<usize>().ok()?;
    (1..=MAX_PORTS).contains(&n).then_some(n)
}

/// Analyse le contenu d'un fichier ; `nports` vient normalement du nom de fichier.
pub fn parse_str(text: &str, nports: usize) -> Result<TouchstoneData, TouchstoneError> {
    if nports > MAX_PORTS {
        return Err(TouchstoneError::PortCount(format!("{nports} ports (max {MAX_PORTS})")));
    }
    let mut parser = Parser::new(nports);
    for line in text.lines() {
        if !parser.feed_line(line)? {
            break;
        }
    }
    parser.finish()
}

// ─── Analyseur ligne par ligne ────────────────────────────────────────────────

struct Parser {
    nports: usize,
    options: OptionLine,
    option_seen: bool,
    comments: Vec<String>,

    // Touchstone 2.0
    is_v2: bool,
    in_network_data: bool,
    two_port_21_12: bool,

    pending: Vec<f64>,
    freq_hz: Vec<f64>,
    s: Vec<SMatrix>,
}

impl Parser {
    fn new(nports: usize) -> Self {
        Parser {
            nports,
            options: OptionLine::default(),
            option_seen: false,
            comments: Vec::new(),
            is_v2: false,
            in_network_data: false,
            two_port_21_12: true,
            pending: Vec::new(),
            freq_hz: Vec::new(),
            s: Vec::new(),
        }
    }

    fn values_per_point(&self) -> usize {
        1 + self.nports * self.nports * 2
    }

    /// Retourne `false` quand la collecte des données réseau est terminée.
    fn feed_line(&mut self, raw: &str) -> Result<bool, TouchstoneError> {
        let line = raw.trim();
        if line.is_empty() {
            return Ok(true);
        }

        if let Some(comment) = line.strip_prefix('!') {
            self.comments.push(comment.trim().to_string());
            return Ok(true);
        }

        if line.starts_with('#') {
            if self.option_seen {
                tracing::warn!(line, "extra option line ignored");
            } else {
                self.options = OptionLine::parse(line);
                self.option_seen = true;
            }
            return Ok(true);
        }

        if line.starts_with('[') {
            return self.keyword(line);
        }

        // En v2, seules les lignes après [Network Data] sont des données
        if self.is_v2 && !self.in_network_data {
            return Ok(true);
        }

        let data = match line.find('!') {
            Some(idx) => line[..idx].trim(),
            None => line,
        };
        if data.is_empty() {
            return Ok(true);
        }

        let mut values = data.split_whitespace().filter_map(|tok| match tok.parse::<f64>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::debug!(token = tok, "non-numeric token skipped");
                None
            }
        });

        // Bloc bruit (v1, 2 ports) : la fréquence repart en arrière
        if self.pending.is_empty() {
            let Some(first) = values.next() else {
                return Ok(true);
            };
            if let (false, 2, Some(&last)) = (self.is_v2, self.nports, self.freq_hz.last()) {
                if first * self.options.unit.multiplier() <= last {
                    tracing::debug!("frequency went backwards, treating rest as noise data");
                    return Ok(false);
                }
            }
            self.pending.push(first);
        }
        self.pending.extend(values);
        self.drain_points();
        Ok(true)
    }

    fn keyword(&mut self, line: &str) -> Result<bool, TouchstoneError> {
        let lower = line.to_ascii_lowercase();
        self.is_v2 = true;

        if lower.starts_with("[number of ports]") {
            let n = line
                .split_whitespace()
                .nth(3)
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| (1..=MAX_PORTS).contains(n))
                .ok_or_else(|| TouchstoneError::InvalidKeyword(line.to_string()))?;
            self.nports = n;
        } else if lower.starts_with("[two-port data order]") {
            if lower.contains("12_21") {
                self.two_port_21_12 = false;
            } else if lower.contains("21_12") {
                self.two_port_21_12 = true;
            } else {
                return Err(TouchstoneError::InvalidKeyword(line.to_string()));
            }
        } else if lower.starts_with("[network data]") {
            self.in_network_data = true;
        } else if lower.starts_with("[noise data]") || lower.starts_with("[end]") {
            return Ok(false);
        }
        Ok(true)
    }

    fn drain_points(&mut self) {
        if self.nports == 0 {
            return;
        }
        let per_point = self.values_per_point();
        while self.pending.len() >= per_point {
            let rest = self.pending.split_off(per_point);
            let point = std::mem::replace(&mut self.pending, rest);
            self.push_point(&point);
        }
    }

    fn push_point(&mut self, point: &[f64]) {
        let n = self.nports;
        let fmt = self.options.format;
        let mut m = SMatrix::zeros(n);

        for (k, pair) in point[1..].chunks_exact(2).enumerate() {
            let (row, col) = (k / n, k % n);
            // Ordre 2 ports : S11 S21 S12 S22
            let (i, j) = if n == 2 && self.two_port_21_12 {
                (col, row)
            } else {
                (row, col)
            };
            m[(i, j)] = fmt.to_complex(pair[0], pair[1]);
        }

        self.freq_hz.push(point[0] * self.options.unit.multiplier());
        self.s.push(m);
    }

    fn finish(self) -> Result<TouchstoneData, TouchstoneError> {
        if self.nports == 0 {
            return Err(TouchstoneError::PortCount("port count unknown".to_string()));
        }
        let needed = self.values_per_point();
        if self.s.is_empty() {
            return Err(TouchstoneError::NotEnoughData {
                found: self.pending.len(),
                needed,
            });
        }
        if !self.pending.is_empty() {
            tracing::warn!(
                leftover = self.pending.len(),
                "trailing values do not form a full frequency point, dropped"
            );
        }

        Ok(TouchstoneData {
            freq_hz: self.freq_hz,
            s: self.s,
            nports: self.nports,
            format: self.options.format,
            unit: self.options.unit,
            z0: self.options.z0,
            comments: self.comments,
        })
    }
}
