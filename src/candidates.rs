//! Candidate space generation.
//!
//! A candidate is one hypothesized document location: either a link parsed
//! from a subject's discovery page (confirmed to be advertised, `is_probe =
//! false`) or a combinatorially generated URL (`is_probe = true`) that is not
//! known to exist until fetched.
//!
//! Output order is fully deterministic - parsed entries first in page order,
//! then the cartesian product of exam type × year × language × filename
//! pattern in configured order - so batch numbering is reproducible across
//! runs.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::MirrorConfig;

/// First year of the DSE exam; numeric year tokens below this are CE.
const DSE_CUTOFF_YEAR: i32 = 2012;

/// Year-token literals that denote practice/sample papers (DSE).
const DSE_LITERAL_YEARS: &[&str] = &["sp", "pp"];

#[allow(clippy::expect_used)]
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=["']([^"']+)["']"#).expect("href regex is valid"));

/// The exam series a candidate belongs to. Determines the storage path
/// segment between subject and language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    /// Diploma of Secondary Education (2012 onward, plus `pp`/`sp` papers).
    Dse,
    /// Certificate of Education (before 2012).
    Ce,
    /// Advanced Level (year tokens carry an `al` suffix).
    Al,
}

impl ExamType {
    /// Stable lowercase form used in storage paths.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dse => "dse",
            Self::Ce => "ce",
            Self::Al => "al",
        }
    }

    /// Infers the exam type from a year token.
    ///
    /// - `al` suffix → [`ExamType::Al`]
    /// - `sp`/`pp` literals → [`ExamType::Dse`]
    /// - integer ≥ 2012 → [`ExamType::Dse`], below → [`ExamType::Ce`]
    /// - anything unparsable → [`ExamType::Dse`]
    #[must_use]
    pub fn classify_year(year: &str) -> Self {
        let lower = year.to_ascii_lowercase();
        if lower.ends_with("al") {
            return Self::Al;
        }
        if DSE_LITERAL_YEARS.contains(&lower.as_str()) {
            return Self::Dse;
        }
        match lower.parse::<i32>() {
            Ok(y) if y >= DSE_CUTOFF_YEAR => Self::Dse,
            Ok(_) => Self::Ce,
            Err(_) => Self::Dse,
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Full URL on the document host.
    pub url: String,
    /// Subject key.
    pub subject: String,
    /// Language segment (`eng`/`chi`).
    pub language: String,
    /// Year token; may be non-numeric (`pp`, `sp`, `1994al`).
    pub year: String,
    /// Filename segment.
    pub filename: String,
    /// Exam series, inferred or enumerated.
    pub exam_type: ExamType,
    /// `false` for discovery-page links, `true` for generated probes.
    pub is_probe: bool,
}

impl Candidate {
    /// Deterministic storage path:
    /// `root/subject/exam_type/language/year/filename`.
    #[must_use]
    pub fn storage_path(&self, root: &Path) -> PathBuf {
        root.join(&self.subject)
            .join(self.exam_type.as_str())
            .join(&self.language)
            .join(&self.year)
            .join(&self.filename)
    }
}

/// Parses candidate links out of a subject's discovery page.
///
/// Keeps only links on the configured document host with an accepted file
/// extension whose path decomposes as `subject/language/year/filename` with
/// the requested subject. Malformed links are skipped silently; the
/// combinatorial pass will probe those cells anyway. A URL linked more than
/// once on the page yields one candidate, keeping its first position.
#[must_use]
pub fn parse_page_links(html: &str, subject_key: &str, config: &MirrorConfig) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for capture in HREF_RE.captures_iter(html) {
        let href = capture.get(1).map_or("", |m| m.as_str());
        if !href.starts_with(&config.file_base_url) {
            continue;
        }
        if !config
            .accepted_extensions
            .iter()
            .any(|ext| href.ends_with(ext.as_str()))
        {
            continue;
        }

        let rest = &href[config.file_base_url.len()..];
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() < 4 {
            continue;
        }
        let (subj, lang, year, filename) = (parts[0], parts[1], parts[2], parts[3]);
        if subj != subject_key {
            continue;
        }
        if !seen.insert(href) {
            continue;
        }

        candidates.push(Candidate {
            url: href.to_string(),
            subject: subj.to_string(),
            language: lang.to_string(),
            year: year.to_string(),
            filename: filename.to_string(),
            exam_type: ExamType::classify_year(year),
            is_probe: false,
        });
    }

    candidates
}

/// Builds the full ordered candidate list for a subject.
///
/// Parsed entries come first in page order, followed by the cartesian product
/// of (exam type → configured year list) × languages × filename patterns.
/// URLs already produced by parsing (or an earlier cell) are skipped, and
/// every generated entry is marked `is_probe = true`.
#[must_use]
pub fn generate_candidates(
    subject_key: &str,
    parsed: Vec<Candidate>,
    config: &MirrorConfig,
) -> Vec<Candidate> {
    let mut seen: HashSet<String> = parsed.iter().map(|c| c.url.clone()).collect();
    let mut all = parsed;

    for range in &config.year_ranges {
        for year in &range.years {
            for language in &config.languages {
                for filename in &config.file_patterns {
                    let url = format!(
                        "{}{subject_key}/{language}/{year}/{filename}",
                        config.file_base_url
                    );
                    if !seen.insert(url.clone()) {
                        continue;
                    }
                    all.push(Candidate {
                        url,
                        subject: subject_key.to_string(),
                        language: language.clone(),
                        year: year.clone(),
                        filename: filename.clone(),
                        exam_type: range.exam_type,
                        is_probe: true,
                    });
                }
            }
        }
    }

    all
}
