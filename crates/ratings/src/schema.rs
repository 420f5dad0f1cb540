use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 5;
/// Slider position for an item the rater has not scored yet.
pub const DEFAULT_SCORE: u8 = 3;
pub const MAX_EXPERIENCE_YEARS: f64 = 80.0;

/// Identity of an item within one modality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub method: String,
    pub filename: String,
}

impl ItemKey {
    pub fn new(method: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { method: method.into(), filename: filename.into() }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.filename, self.method)
    }
}

/// One scoreable image. Items come from the directory listing and are never
/// persisted on their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub modality: String,
    pub method: String,
    pub filename: String,
    pub source_location: PathBuf,
}

impl Item {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.method, &self.filename)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Sharpness,
    Artifact,
    Naturalness,
    DiagnosticConfidence,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Sharpness,
        Metric::Artifact,
        Metric::Naturalness,
        Metric::DiagnosticConfidence,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Metric::Sharpness => "sharpness",
            Metric::Artifact => "artifact",
            Metric::Naturalness => "naturalness",
            Metric::DiagnosticConfidence => "diagnostic_confidence",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// MOS scores, one per metric.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub sharpness: u8,
    pub artifact: u8,
    pub naturalness: u8,
    pub diagnostic_confidence: u8,
}

impl Scores {
    pub fn new(sharpness: u8, artifact: u8, naturalness: u8, diagnostic_confidence: u8) -> Self {
        Self { sharpness, artifact, naturalness, diagnostic_confidence }
    }

    pub fn get(&self, metric: Metric) -> u8 {
        match metric {
            Metric::Sharpness => self.sharpness,
            Metric::Artifact => self.artifact,
            Metric::Naturalness => self.naturalness,
            Metric::DiagnosticConfidence => self.diagnostic_confidence,
        }
    }

    pub fn set(&mut self, metric: Metric, value: u8) {
        match metric {
            Metric::Sharpness => self.sharpness = value,
            Metric::Artifact => self.artifact = value,
            Metric::Naturalness => self.naturalness = value,
            Metric::DiagnosticConfidence => self.diagnostic_confidence = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, u8)> + '_ {
        Metric::ALL.into_iter().map(move |m| (m, self.get(m)))
    }
}

impl Default for Scores {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE, DEFAULT_SCORE, DEFAULT_SCORE, DEFAULT_SCORE)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rater {
    pub name: String,
    pub institution: String,
    pub experience_years: f64,
}

impl Rater {
    pub fn new(name: impl Into<String>, institution: impl Into<String>, experience_years: f64) -> Self {
        Self { name: name.into(), institution: institution.into(), experience_years }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub rater: Rater,
    pub modality: String,
    pub method: String,
    pub filename: String,
    pub scores: Scores,
    pub submission_id: Option<Uuid>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl RatingRecord {
    pub fn new(rater: Rater, item: &Item, scores: Scores) -> Self {
        Self {
            rater,
            modality: item.modality.clone(),
            method: item.method.clone(),
            filename: item.filename.clone(),
            scores,
            submission_id: None,
            submitted_at: None,
        }
    }

    /// Fresh submission id and timestamp, set when the rater presses submit.
    pub fn stamped(mut self) -> Self {
        self.submission_id = Some(Uuid::new_v4());
        self.submitted_at = Some(Utc::now());
        self
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(&self.method, &self.filename)
    }
}

/// Which fields make two records "the same submission".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityScope {
    /// `(rater_name, filename, method)`
    RaterAndItem,
    /// `(filename, method)`; the last rater to submit an item owns the row.
    ItemOnly,
}

/// How rating datasets are split into files for one deployment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// One dataset per (modality, rater).
    #[default]
    PerRater,
    /// One dataset per modality, raters kept apart.
    Shared,
    /// One dataset per modality, one row per item regardless of rater.
    SharedByItem,
}

impl Partition {
    pub fn scope(self) -> IdentityScope {
        match self {
            Partition::PerRater | Partition::Shared => IdentityScope::RaterAndItem,
            Partition::SharedByItem => IdentityScope::ItemOnly,
        }
    }

    /// `{modality}_{rater}_ratings.csv` or `{modality}_ratings.csv`.
    pub fn dataset_file_name(self, modality: &str, rater_name: &str) -> String {
        match self {
            Partition::PerRater => {
                format!("{}_{}_ratings.csv", sanitize_name(modality), sanitize_name(rater_name))
            }
            Partition::Shared | Partition::SharedByItem => {
                format!("{}_ratings.csv", sanitize_name(modality))
            }
        }
    }
}

impl FromStr for Partition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_rater" | "per-rater" => Ok(Partition::PerRater),
            "shared" => Ok(Partition::Shared),
            "shared_by_item" | "shared-by-item" => Ok(Partition::SharedByItem),
            other => Err(format!("unknown partition policy: {other}")),
        }
    }
}

/// Replace characters that are not allowed in file names on common platforms.
pub fn sanitize_name(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize_name(r#"Dr. A/B\C:D*E?F"G<H>I|J"#), "Dr. A_B_C_D_E_F_G_H_I_J");
    }

    #[test]
    fn test_dataset_file_names_per_partition() {
        assert_eq!(
            Partition::PerRater.dataset_file_name("CT", "Alice Wu"),
            "CT_Alice Wu_ratings.csv"
        );
        assert_eq!(Partition::Shared.dataset_file_name("CT", "Alice"), "CT_ratings.csv");
        assert_eq!(Partition::SharedByItem.dataset_file_name("CT", "Bob"), "CT_ratings.csv");
    }

    #[test]
    fn test_partition_parses_config_values() {
        assert_eq!("per_rater".parse::<Partition>().unwrap(), Partition::PerRater);
        assert_eq!(" Shared ".parse::<Partition>().unwrap(), Partition::Shared);
        assert_eq!("shared-by-item".parse::<Partition>().unwrap(), Partition::SharedByItem);
        assert!("global".parse::<Partition>().is_err());
    }

    #[test]
    fn test_item_key_display_matches_legacy_uid() {
        assert_eq!(ItemKey::new("m1", "img1.png").to_string(), "img1.png_m1");
    }
}
