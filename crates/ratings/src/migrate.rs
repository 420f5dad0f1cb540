//! CSV layout of a rating dataset and its forward-compatible decoding.
//!
//! Columns are resolved by name. Older files that lack a column get the
//! column's default (empty text, zero for numbers) and are flagged for a
//! full-schema rewrite.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use csv::{ReaderBuilder, StringRecord, Trim, WriterBuilder};
use serde::Serialize;
use uuid::Uuid;

use crate::{Metric, Rater, RatingRecord, Scores};

/// Current schema, in write order.
pub const COLUMNS: [&str; 12] = [
    "name",
    "institution",
    "years_of_experience",
    "modality",
    "method",
    "filename",
    "sharpness",
    "artifact",
    "naturalness",
    "diagnostic_confidence",
    "submission_id",
    "submit_time",
];

/// Without these a row cannot be matched to an item.
const IDENTITY_COLUMNS: [&str; 2] = ["method", "filename"];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Non-fatal problems found while opening a dataset.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LoadWarning {
    /// The file could not be read as a dataset and was replaced by an empty one.
    Corrupt { reason: String, preserved_at: Option<String> },
    MissingColumns { columns: Vec<String> },
    /// Columns outside the schema; they are not carried into rewrites.
    UnknownColumns { columns: Vec<String> },
    UnreadableRow { line: u64, reason: String },
    DuplicateRows { merged: usize },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::Corrupt { reason, preserved_at } => match preserved_at {
                Some(at) => write!(f, "dataset unreadable ({reason}), started empty; old copy kept at {at}"),
                None => write!(f, "dataset unreadable ({reason}), started empty"),
            },
            LoadWarning::MissingColumns { columns } => {
                write!(f, "backfilled missing columns: {}", columns.join(", "))
            }
            LoadWarning::UnknownColumns { columns } => {
                write!(f, "ignoring unknown columns: {}", columns.join(", "))
            }
            LoadWarning::UnreadableRow { line, reason } => {
                write!(f, "dropped unreadable row at line {line}: {reason}")
            }
            LoadWarning::DuplicateRows { merged } => {
                write!(f, "merged {merged} duplicate rows into their latest submission")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Decoded {
    pub records: Vec<RatingRecord>,
    pub warnings: Vec<LoadWarning>,
    /// The bytes on disk are not in current-schema form.
    pub needs_rewrite: bool,
}

/// Decode dataset bytes. `Err` means the file as a whole is unusable.
pub fn decode(bytes: &[u8]) -> Result<Decoded, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Decoded { needs_rewrite: true, ..Decoded::default() });
    }

    let mut reader = ReaderBuilder::new().trim(Trim::Headers).from_reader(bytes);
    let headers = reader
        .headers()
        .map_err(|e| format!("unreadable header: {e}"))?
        .clone();
    let positions: HashMap<&str, usize> =
        headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    for col in IDENTITY_COLUMNS {
        if !positions.contains_key(col) {
            return Err(format!("missing required column {col:?}"));
        }
    }

    let mut out = Decoded::default();

    let missing: Vec<String> = COLUMNS
        .iter()
        .filter(|c| !positions.contains_key(*c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        out.warnings.push(LoadWarning::MissingColumns { columns: missing });
        out.needs_rewrite = true;
    }

    let unknown: Vec<String> = headers
        .iter()
        .filter(|h| !COLUMNS.contains(h))
        .map(str::to_string)
        .collect();
    if !unknown.is_empty() {
        out.warnings.push(LoadWarning::UnknownColumns { columns: unknown });
    }

    for row in reader.records() {
        let parsed = row
            .map_err(|e| (e.position().map(|p| p.line()).unwrap_or(0), e.to_string()))
            .and_then(|row| {
                parse_row(&row, &positions)
                    .map_err(|reason| (row.position().map(|p| p.line()).unwrap_or(0), reason))
            });

        match parsed {
            Ok(record) => out.records.push(record),
            Err((line, reason)) => {
                out.warnings.push(LoadWarning::UnreadableRow { line, reason });
                out.needs_rewrite = true;
            }
        }
    }

    Ok(out)
}

fn field<'r>(row: &'r StringRecord, positions: &HashMap<&str, usize>, name: &str) -> &'r str {
    positions
        .get(name)
        .and_then(|&i| row.get(i))
        .map(str::trim)
        .unwrap_or("")
}

fn parse_row(row: &StringRecord, positions: &HashMap<&str, usize>) -> Result<RatingRecord, String> {
    let cell = |name: &str| field(row, positions, name);

    let method = cell("method");
    let filename = cell("filename");
    if method.is_empty() || filename.is_empty() {
        return Err("empty method or filename".to_string());
    }

    let mut scores = Scores::new(0, 0, 0, 0);
    for metric in Metric::ALL {
        let value = parse_score(cell(metric.column())).map_err(|e| format!("{metric}: {e}"))?;
        scores.set(metric, value);
    }

    let years = parse_years(cell("years_of_experience"))?;

    Ok(RatingRecord {
        rater: Rater::new(cell("name"), cell("institution"), years),
        modality: cell("modality").to_string(),
        method: method.to_string(),
        filename: filename.to_string(),
        scores,
        submission_id: Uuid::parse_str(cell("submission_id")).ok(),
        submitted_at: parse_time(cell("submit_time")),
    })
}

/// Integer cell; spreadsheet tools sometimes write `4.0`.
fn parse_score(s: &str) -> Result<u8, String> {
    if s.is_empty() {
        return Ok(0);
    }
    if let Ok(v) = s.parse::<u8>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && (0.0..=255.0).contains(&v) => Ok(v as u8),
        _ => Err(format!("not an integer score: {s:?}")),
    }
}

fn parse_years(s: &str) -> Result<f64, String> {
    if s.is_empty() {
        return Ok(0.0);
    }
    s.parse::<f64>()
        .map_err(|_| format!("years_of_experience is not a number: {s:?}"))
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|n| n.and_utc())
        })
}

/// Encode records in full schema.
pub fn encode<'a>(records: impl IntoIterator<Item = &'a RatingRecord>) -> Result<Vec<u8>, csv::Error> {
    let mut w = WriterBuilder::new().from_writer(Vec::new());
    w.write_record(COLUMNS)?;

    for r in records {
        let row: [String; 12] = [
            r.rater.name.clone(),
            r.rater.institution.clone(),
            r.rater.experience_years.to_string(),
            r.modality.clone(),
            r.method.clone(),
            r.filename.clone(),
            r.scores.sharpness.to_string(),
            r.scores.artifact.to_string(),
            r.scores.naturalness.to_string(),
            r.scores.diagnostic_confidence.to_string(),
            r.submission_id.map(|id| id.to_string()).unwrap_or_default(),
            r.submitted_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
        ];
        w.write_record(&row)?;
    }

    w.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_file_without_rater_columns_is_backfilled() {
        let legacy = "modality,method,filename,sharpness,artifact,naturalness,diagnostic_confidence\n\
                      CT,m1,img1.png,4,5,3,4\n";
        let d = decode(legacy.as_bytes()).unwrap();

        assert!(d.needs_rewrite);
        assert_eq!(d.records.len(), 1);
        let r = &d.records[0];
        assert_eq!(r.rater.name, "");
        assert_eq!(r.rater.experience_years, 0.0);
        assert_eq!(r.scores, Scores::new(4, 5, 3, 4));
        assert!(r.submitted_at.is_none());

        let LoadWarning::MissingColumns { columns } = &d.warnings[0] else {
            panic!("expected missing columns warning, got {:?}", d.warnings);
        };
        assert_eq!(
            columns,
            &vec!["name", "institution", "years_of_experience", "submission_id", "submit_time"]
        );
    }

    #[test]
    fn test_current_schema_needs_no_rewrite() {
        let bytes = format!("{}\nAlice,GH,3.5,CT,m1,img1.png,4,5,3,4,,\n", COLUMNS.join(","));
        let d = decode(bytes.as_bytes()).unwrap();

        assert!(!d.needs_rewrite);
        assert!(d.warnings.is_empty());
        assert_eq!(d.records[0].rater.experience_years, 3.5);
    }

    #[test]
    fn test_bom_and_float_scores_are_accepted() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(
            b"method,filename,sharpness,artifact,naturalness,diagnostic_confidence\nm1,a.png,4.0,2,5.0,1\n",
        );
        let d = decode(&bytes).unwrap();
        assert_eq!(d.records[0].scores, Scores::new(4, 2, 5, 1));
    }

    #[test]
    fn test_bad_rows_are_dropped_with_line_numbers() {
        let bytes = "method,filename,sharpness,artifact,naturalness,diagnostic_confidence\n\
                     m1,a.png,4,2,5,1\n\
                     m1,b.png,high,2,5,1\n\
                     m1,c.png,4\n\
                     m1,d.png,1,1,1,1\n";
        let d = decode(bytes.as_bytes()).unwrap();

        let kept: Vec<&str> = d.records.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(kept, vec!["a.png", "d.png"]);
        let lines: Vec<u64> = d
            .warnings
            .iter()
            .filter_map(|w| match w {
                LoadWarning::UnreadableRow { line, .. } => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![3, 4]);
    }

    #[test]
    fn test_file_without_identity_columns_is_unusable() {
        assert!(decode(b"\x00\x01\x02 not a table").is_err());
        assert!(decode(b"name,institution\nAlice,GH\n").is_err());
    }

    #[test]
    fn test_empty_file_is_an_empty_dataset() {
        let d = decode(b"").unwrap();
        assert!(d.records.is_empty());
        assert!(d.needs_rewrite);
    }

    #[test]
    fn test_encode_writes_full_header_and_timestamps() {
        let mut r = RatingRecord {
            rater: Rater::new("Alice", "General Hospital", 3.5),
            modality: "CT".into(),
            method: "m1".into(),
            filename: "img1.png".into(),
            scores: Scores::new(4, 5, 3, 4),
            submission_id: None,
            submitted_at: None,
        };
        r.submitted_at = DateTime::parse_from_rfc3339("2026-10-19T08:30:00Z")
            .ok()
            .map(|t| t.with_timezone(&Utc));

        let text = String::from_utf8(encode([&r]).unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "Alice,General Hospital,3.5,CT,m1,img1.png,4,5,3,4,,2026-10-19T08:30:00Z"
        );
    }
}
