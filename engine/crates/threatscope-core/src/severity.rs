//! Severity tiers and record lifecycle status

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Canonical severity tier for findings.
///
/// The lowercase string forms (`critical|high|medium|low|info`) are a stable
/// contract with the rendering and report layers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding, no security impact
    #[default]
    Info,
    /// Low severity, minimal risk
    Low,
    /// Medium severity, moderate risk
    Medium,
    /// High severity, significant risk
    High,
    /// Critical severity, immediate action required
    Critical,
}

impl Severity {
    /// All tiers, most severe first
    pub const ALL: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
        Severity::Info,
    ];

    /// Convert a CVSS base score to a tier using the CVSS v3 bands.
    ///
    /// Lower bounds are inclusive: exactly 9.0 is critical, exactly 7.0 is
    /// high, exactly 4.0 is medium. Anything above zero is at least low.
    pub fn from_cvss(score: f32) -> Self {
        match score {
            s if s >= 9.0 => Severity::Critical,
            s if s >= 7.0 => Severity::High,
            s if s >= 4.0 => Severity::Medium,
            s if s > 0.0 => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Classify a textual score. Unparseable input is `Info`.
    pub fn from_score(score: &str) -> Self {
        parse_score(score).map_or(Severity::Info, Severity::from_cvss)
    }

    /// Classify a free-text risk label (English or Spanish vocabulary).
    ///
    /// Case-insensitive substring match checked critical, high, medium, low
    /// in that order; no match is `Info`.
    pub fn from_text(label: &str) -> Self {
        let t = label.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| t.contains(w));

        if has(&["critical", "críti"]) {
            Severity::Critical
        } else if has(&["high", "alta", "alto"]) {
            Severity::High
        } else if has(&["medium", "media", "moderate", "warning"]) {
            Severity::Medium
        } else if has(&["low", "baja", "bajo"]) {
            Severity::Low
        } else {
            Severity::Info
        }
    }

    /// Map a 0-4 integer scale (0 = info ... 4 = critical)
    pub fn from_level(level: i64) -> Self {
        match level {
            4.. => Severity::Critical,
            3 => Severity::High,
            2 => Severity::Medium,
            1 => Severity::Low,
            _ => Severity::Info,
        }
    }

    /// Canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "info" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Parse the leading decimal number of a string (`"9.8 (AV:N)"` -> `9.8`).
///
/// Returns `None` when the text does not start with a number, after
/// skipping leading whitespace.
pub fn parse_score(text: &str) -> Option<f32> {
    let text = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;

    for (i, c) in text.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }

    if !seen_digit {
        return None;
    }

    text[..end]
        .trim_end_matches('.')
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Lifecycle status of a record.
///
/// Extraction always produces `Pending`; other values come from explicit
/// user action or snapshot reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    Exploited,
    Patched,
    FalsePositive,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Pending,
        Status::Exploited,
        Status::Patched,
        Status::FalsePositive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Exploited => "exploited",
            Status::Patched => "patched",
            Status::FalsePositive => "false_positive",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Status::Pending)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(Status::Pending),
            "exploited" => Ok(Status::Exploited),
            "patched" => Ok(Status::Patched),
            "false_positive" => Ok(Status::FalsePositive),
            other => Err(format!("unknown status: {other}")),
        }
    }
}
