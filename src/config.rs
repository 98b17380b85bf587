//! Mirror configuration: subject catalog, candidate-space dimensions, and
//! engine tunables.
//!
//! All fields have built-in defaults matching the production library layout,
//! so `MirrorConfig::default()` is a fully usable configuration. An optional
//! JSON config file may override any subset of fields; CLI flags are applied
//! on top of the loaded config by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::candidates::ExamType;

/// Default concurrency bound for the fetch engine.
pub const DEFAULT_CONCURRENCY: usize = 30;

/// Default number of candidates per batch (one checkpoint per batch).
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default total request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Default jitter window before each request, in milliseconds.
pub const DEFAULT_MIN_DELAY_MS: u64 = 50;
pub const DEFAULT_MAX_DELAY_MS: u64 = 100;

const DEFAULT_BASE_URL: &str = "https://dselib.com";
const DEFAULT_FILE_BASE_URL: &str = "https://src.dselib.com/";

/// Errors from loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for [`MirrorConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// One subject in the catalog: a top-level partition of the document space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectInfo {
    /// Subject key as it appears in URLs and storage paths.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Native-language display name.
    pub native_name: String,
}

/// The configured year list for one exam type, in probe order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearRange {
    /// Exam type these years belong to.
    pub exam_type: ExamType,
    /// Year tokens in enumeration order. May contain non-numeric literals
    /// such as `pp`/`sp` (practice/sample papers) or suffixed forms like
    /// `1994al`.
    pub years: Vec<String>,
}

/// Complete mirror configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Base URL for discovery pages (`base_url/<subject>`).
    pub base_url: String,
    /// Base URL of the document host, with trailing slash. Candidate URLs are
    /// `file_base_url + subject/language/year/filename`.
    pub file_base_url: String,
    /// Subject catalog, in iteration order.
    pub subjects: Vec<SubjectInfo>,
    /// Languages to enumerate.
    pub languages: Vec<String>,
    /// Year lists per exam type, in enumeration order.
    pub year_ranges: Vec<YearRange>,
    /// Filename patterns to probe per (exam type, year, language) cell.
    pub file_patterns: Vec<String>,
    /// File extensions accepted when parsing discovery-page links.
    pub accepted_extensions: Vec<String>,
    /// Content-Type substrings accepted for a 200 response. Anything else is
    /// recorded as a content-mismatch failure.
    pub accepted_content_types: Vec<String>,
    /// Maximum in-flight requests across the whole run.
    pub concurrency: usize,
    /// Candidates per batch; the state record is checkpointed after each.
    pub batch_size: usize,
    /// Jitter window lower bound (milliseconds) before each request.
    pub min_delay_ms: u64,
    /// Jitter window upper bound (milliseconds) before each request.
    pub max_delay_ms: u64,
    /// Total per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            file_base_url: DEFAULT_FILE_BASE_URL.to_string(),
            subjects: default_subjects(),
            languages: vec!["eng".to_string(), "chi".to_string()],
            year_ranges: default_year_ranges(),
            file_patterns: default_file_patterns(),
            accepted_extensions: vec![".pdf".to_string(), ".mp3".to_string()],
            accepted_content_types: vec![
                "pdf".to_string(),
                "octet-stream".to_string(),
                "mpeg".to_string(),
            ],
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl MirrorConfig {
    /// Loads configuration from a JSON file. Missing fields fall back to the
    /// built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed. Unlike
    /// the durable state record, a broken config file is fatal: running with
    /// silently wrong dimensions would probe the wrong candidate space.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Looks up a subject by key.
    #[must_use]
    pub fn subject(&self, key: &str) -> Option<&SubjectInfo> {
        self.subjects.iter().find(|s| s.key == key)
    }

    /// Returns the discovery-page URL for a subject.
    #[must_use]
    pub fn discovery_url(&self, subject_key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), subject_key)
    }
}

fn default_subjects() -> Vec<SubjectInfo> {
    const CATALOG: &[(&str, &str, &str)] = &[
        ("chi", "Chinese", "中文"),
        ("eng", "English", "英文"),
        ("m0", "Mathematics", "數學"),
        ("citizen", "Citizenship", "公民與社會發展"),
        ("ls", "Liberal Studies", "通識"),
        ("phy", "Physics", "物理"),
        ("chem", "Chemistry", "化學"),
        ("bio", "Biology", "生物"),
        ("m1", "Mathematics M1", "數學M1"),
        ("m2", "Mathematics M2", "數學M2"),
        ("bafs", "BAFS", "企業會計財務"),
        ("econ", "Economics", "經濟"),
        ("chihist", "Chinese History", "中國歷史"),
        ("enghist", "History", "世界歷史"),
        ("geog", "Geography", "地理"),
        ("ict", "ICT", "資訊科技"),
        ("ths", "Tourism", "旅遊與款待"),
    ];
    CATALOG
        .iter()
        .map(|(key, name, native_name)| SubjectInfo {
            key: (*key).to_string(),
            name: (*name).to_string(),
            native_name: (*native_name).to_string(),
        })
        .collect()
}

fn default_year_ranges() -> Vec<YearRange> {
    let mut dse: Vec<String> = (2012..=2025).map(|y| y.to_string()).collect();
    // Practice paper and sample paper tokens probe alongside real years.
    dse.push("pp".to_string());
    dse.push("sp".to_string());

    let ce: Vec<String> = (1980..=2011).map(|y| y.to_string()).collect();
    // The source host encodes AL years with an `al` suffix.
    let al: Vec<String> = (1980..=2013).map(|y| format!("{y}al")).collect();

    vec![
        YearRange {
            exam_type: ExamType::Dse,
            years: dse,
        },
        YearRange {
            exam_type: ExamType::Ce,
            years: ce,
        },
        YearRange {
            exam_type: ExamType::Al,
            years: al,
        },
    ]
}

fn default_file_patterns() -> Vec<String> {
    [
        "p1.pdf", "p2.pdf", "p3.pdf", "p1a.pdf", "p1b.pdf", "p2a.pdf", "p2b.pdf", "p4.pdf",
        "p5.pdf", "ans.pdf", "per.pdf", "ms.pdf", "p1_ans.pdf", "p2_ans.pdf", "mc.pdf",
        "mc_ans.pdf", "aud.mp3",
    ]
    .iter()
    .map(|p| (*p).to_string())
    .collect()
}
