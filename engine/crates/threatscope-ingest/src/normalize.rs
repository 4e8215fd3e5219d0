//! Text normalization shared by the dialect extractors

use chrono::{Local, TimeZone};
use regex::Regex;
use std::sync::LazyLock;
use threatscope_core::parse_score;

/// Display format for scan timestamps, e.g. `07/03/2024, 14:05:09`
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

static CVE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CVE-\d{4}-\d+").expect("valid CVE pattern"));

static IPV4_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("valid IPv4 pattern")
});

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Replace markup tags with spaces, collapse whitespace runs and trim
pub fn strip_html(text: &str) -> String {
    let untagged = MARKUP_TAG.replace_all(text, " ");
    WHITESPACE_RUN.replace_all(&untagged, " ").trim().to_string()
}

/// CVE identifiers in encounter order, duplicates kept
pub fn harvest_cves(text: &str) -> Vec<String> {
    CVE_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// `harvest_cves` joined for the record's `cve` field
pub fn cve_list(text: &str) -> String {
    harvest_cves(text).join(", ")
}

/// First IPv4-shaped token in `text`
pub fn first_ipv4(text: &str) -> Option<&str> {
    IPV4_PATTERN.find(text).map(|m| m.as_str())
}

/// `"<score>"` or `"<score> (<vector>)"`; empty when there is no score
pub fn cvss_display(score: &str, vector: &str) -> String {
    let score = score.trim();
    let vector = vector.trim();
    match (score.is_empty(), vector.is_empty()) {
        (true, _) => String::new(),
        (false, true) => score.to_string(),
        (false, false) => format!("{score} ({vector})"),
    }
}

/// A score that parses and is above zero, as a value and its display text.
///
/// Zero and unparseable scores count as "no score", so callers fall back to a
/// textual risk label.
pub fn positive_score(text: &str) -> Option<(f32, String)> {
    let score = parse_score(text).filter(|s| *s > 0.0)?;
    Some((score, format_score(score)))
}

/// Shortest decimal rendering: `9.8`, `10`, `4.3`
pub fn format_score(score: f32) -> String {
    format!("{score}")
}

/// First line of `text`, trimmed
pub fn first_line(text: &str) -> &str {
    text.trim().lines().next().unwrap_or_default().trim()
}

/// Display timestamp for the current local time
pub fn now_display() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Display timestamp for a unix-seconds attribute value
pub fn unix_display(seconds: &str) -> Option<String> {
    let seconds: i64 = seconds.trim().parse().ok()?;
    Local
        .timestamp_opt(seconds, 0)
        .single()
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
}

/// Trimmed text, `None` when empty
pub fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Cross Site\n\n Scripting</p><br/>found"),
            "Cross Site Scripting found"
        );
        assert_eq!(strip_html("   "), "");
    }

    #[test]
    fn test_harvest_cves_keeps_order_and_duplicates() {
        let text = "see cve-2021-44228 and CVE-2014-0160, again CVE-2021-44228";
        assert_eq!(
            harvest_cves(text),
            vec!["cve-2021-44228", "CVE-2014-0160", "CVE-2021-44228"]
        );
        assert_eq!(cve_list("nothing here"), "");
    }

    #[test]
    fn test_cvss_display() {
        assert_eq!(cvss_display("", "AV:N"), "");
        assert_eq!(cvss_display("7.5", ""), "7.5");
        assert_eq!(
            cvss_display("9.8", "CVSS:3.1/AV:N/AC:L"),
            "9.8 (CVSS:3.1/AV:N/AC:L)"
        );
    }

    #[test]
    fn test_positive_score() {
        assert_eq!(positive_score("9.80"), Some((9.8, "9.8".to_string())));
        assert_eq!(positive_score("10.0").map(|s| s.1), Some("10".to_string()));
        assert_eq!(positive_score("0.0"), None);
        assert_eq!(positive_score("n/a"), None);
    }

    #[test]
    fn test_first_ipv4_and_lines() {
        assert_eq!(first_ipv4("host web01 (10.1.2.3) port 80"), Some("10.1.2.3"));
        assert_eq!(first_ipv4("no address"), None);
        assert_eq!(first_line("\n  http://a/1 \nhttp://b/2"), "http://a/1");
    }

    #[test]
    fn test_unix_display() {
        assert!(unix_display("1700000000").is_some());
        assert!(unix_display("yesterday").is_none());
    }
}
