use serde::Deserialize;
use thiserror::Error;

use crate::{Metric, Rater, RatingRecord, Scores, MAX_EXPERIENCE_YEARS, MAX_SCORE, MIN_SCORE};

/// Caller-supplied data that must be corrected before anything is written.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationError {
    #[error("rater name must not be empty")]
    EmptyName,

    #[error("rater institution must not be empty")]
    EmptyInstitution,

    #[error("years of experience is not a number: {0:?}")]
    MalformedExperience(String),

    #[error("years of experience must be greater than 0 and at most 80, got {0}")]
    ExperienceOutOfRange(f64),

    #[error("{metric} score must be between 1 and 5, got {value}")]
    ScoreOutOfRange { metric: Metric, value: i64 },

    #[error("{metric} score must be a whole number, got {value}")]
    MalformedScore { metric: Metric, value: String },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("record is for modality {found:?} but the dataset holds {expected:?}")]
    ModalityMismatch { expected: String, found: String },
}

impl ValidationError {
    /// Form field to highlight.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyName => "name",
            ValidationError::EmptyInstitution => "institution",
            ValidationError::MalformedExperience(_) | ValidationError::ExperienceOutOfRange(_) => {
                "years_of_experience"
            }
            ValidationError::ScoreOutOfRange { metric, .. }
            | ValidationError::MalformedScore { metric, .. } => metric.column(),
            ValidationError::EmptyField(field) => *field,
            ValidationError::ModalityMismatch { .. } => "modality",
        }
    }
}

/// Parse the free-text experience field of the rater form.
pub fn parse_experience(text: &str) -> Result<f64, ValidationError> {
    let trimmed = text.trim();
    let years: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::MalformedExperience(trimmed.to_string()))?;
    check_experience(years)?;
    Ok(years)
}

fn check_experience(years: f64) -> Result<(), ValidationError> {
    if !years.is_finite() {
        return Err(ValidationError::MalformedExperience(years.to_string()));
    }
    if years <= 0.0 || years > MAX_EXPERIENCE_YEARS {
        return Err(ValidationError::ExperienceOutOfRange(years));
    }
    Ok(())
}

pub fn validate_rater(rater: &Rater) -> Result<(), ValidationError> {
    if rater.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if rater.institution.trim().is_empty() {
        return Err(ValidationError::EmptyInstitution);
    }
    check_experience(rater.experience_years)
}

pub fn validate_record(record: &RatingRecord, modality: &str) -> Result<(), ValidationError> {
    validate_rater(&record.rater)?;

    if record.method.trim().is_empty() {
        return Err(ValidationError::EmptyField("method"));
    }
    if record.filename.trim().is_empty() {
        return Err(ValidationError::EmptyField("filename"));
    }
    if record.modality != modality {
        return Err(ValidationError::ModalityMismatch {
            expected: modality.to_string(),
            found: record.modality.clone(),
        });
    }

    for (metric, value) in record.scores.iter() {
        if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(ValidationError::ScoreOutOfRange { metric, value: value.into() });
        }
    }
    Ok(())
}

/// Scores as submitted, before range checks. Any JSON number is accepted here
/// so that out-of-range and fractional values reach [`parse_scores`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct ScoreInput {
    pub sharpness: f64,
    pub artifact: f64,
    pub naturalness: f64,
    pub diagnostic_confidence: f64,
}

impl From<Scores> for ScoreInput {
    fn from(s: Scores) -> Self {
        Self {
            sharpness: s.sharpness.into(),
            artifact: s.artifact.into(),
            naturalness: s.naturalness.into(),
            diagnostic_confidence: s.diagnostic_confidence.into(),
        }
    }
}

impl ScoreInput {
    fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Sharpness => self.sharpness,
            Metric::Artifact => self.artifact,
            Metric::Naturalness => self.naturalness,
            Metric::DiagnosticConfidence => self.diagnostic_confidence,
        }
    }
}

/// Whole numbers in 1..=5 for every metric, checked in column order.
pub fn parse_scores(input: &ScoreInput) -> Result<Scores, ValidationError> {
    let mut scores = Scores::default();
    for metric in Metric::ALL {
        let raw = input.get(metric);
        if !raw.is_finite() || raw.fract() != 0.0 {
            return Err(ValidationError::MalformedScore { metric, value: raw.to_string() });
        }
        if raw < f64::from(MIN_SCORE) || raw > f64::from(MAX_SCORE) {
            return Err(ValidationError::ScoreOutOfRange { metric, value: raw as i64 });
        }
        scores.set(metric, raw as u8);
    }
    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experience_errors_are_distinct_from_profile_errors() {
        assert_eq!(
            parse_experience("three").unwrap_err(),
            ValidationError::MalformedExperience("three".into())
        );
        assert_eq!(parse_experience("0").unwrap_err(), ValidationError::ExperienceOutOfRange(0.0));
        assert_eq!(parse_experience("81").unwrap_err().field(), "years_of_experience");
        assert_eq!(parse_experience(" 3.5 ").unwrap(), 3.5);
        assert!(parse_experience("NaN").is_err());
    }

    #[test]
    fn test_blank_name_and_institution() {
        let r = Rater::new("  ", "General Hospital", 2.0);
        assert_eq!(validate_rater(&r).unwrap_err().field(), "name");

        let r = Rater::new("Alice", "", 2.0);
        assert_eq!(validate_rater(&r).unwrap_err(), ValidationError::EmptyInstitution);
    }

    fn input(s: [f64; 4]) -> ScoreInput {
        ScoreInput { sharpness: s[0], artifact: s[1], naturalness: s[2], diagnostic_confidence: s[3] }
    }

    #[test]
    fn test_parse_scores_names_the_offending_metric() {
        assert_eq!(parse_scores(&input([4.0, 5.0, 1.0, 2.0])).unwrap(), Scores::new(4, 5, 1, 2));

        let err = parse_scores(&input([3.0, -1.0, 3.0, 3.0])).unwrap_err();
        assert_eq!(err, ValidationError::ScoreOutOfRange { metric: Metric::Artifact, value: -1 });
        assert_eq!(err.field(), "artifact");

        let err = parse_scores(&input([3.0, 3.0, 3.5, 3.0])).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedScore { metric: Metric::Naturalness, .. }));

        let err = parse_scores(&input([3.0, 3.0, 3.0, 300.0])).unwrap_err();
        assert_eq!(err.field(), "diagnostic_confidence");
    }
}
