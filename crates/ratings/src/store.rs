use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use csvdb::{Storage, StorageError};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::index::{merge_duplicates, KeyIndex, RecordId};
use crate::migrate::{self, Decoded, LoadWarning};
use crate::{validate_record, IdentityScope, ItemKey, RatingRecord, ValidationError};

#[derive(Debug, Error)]
pub enum RatingsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("item not found: {0}")]
    NotFound(ItemKey),
}

pub type Result<T> = std::result::Result<T, RatingsError>;

impl From<csv::Error> for RatingsError {
    fn from(e: csv::Error) -> Self {
        RatingsError::Codec(e.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct UpsertResult {
    pub outcome: UpsertOutcome,
    pub dataset_len: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    /// Fraction done; 0 for an empty item list.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub records: usize,
    pub raters: usize,
    pub methods: usize,
    pub last_submitted_at: Option<DateTime<Utc>>,
}

/// Rating records of one modality, persisted through `S`.
///
/// Every mutation re-reads the dataset under the backend's exclusive lock,
/// applies the change and writes the whole dataset back before returning, so
/// the in-memory view only ever reflects what is on storage.
pub struct RatingStore<S: Storage> {
    storage: S,
    modality: String,
    index: KeyIndex,
    records: Vec<RatingRecord>,
    warnings: Vec<LoadWarning>,
}

impl<S: Storage> RatingStore<S> {
    /// Load (creating or migrating as needed) the dataset behind `storage`.
    pub fn open(storage: S, modality: impl Into<String>, scope: IdentityScope) -> Result<Self> {
        let mut store = Self {
            storage,
            modality: modality.into(),
            index: KeyIndex::new(scope),
            records: Vec::new(),
            warnings: Vec::new(),
        };
        store.reload()?;
        Ok(store)
    }

    pub fn modality(&self) -> &str {
        &self.modality
    }

    pub fn scope(&self) -> IdentityScope {
        self.index.scope()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn records(&self) -> &[RatingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Warnings gathered while loading since the last call.
    pub fn take_warnings(&mut self) -> Vec<LoadWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Pick up changes written by anyone else sharing the dataset.
    pub fn reload(&mut self) -> Result<()> {
        let _lock = self.storage.lock_exclusive()?;
        let (records, index) = self.load_locked()?;
        self.records = records;
        self.index = index;
        Ok(())
    }

    /// Must be called with the dataset lock held.
    fn load_locked(&mut self) -> Result<(Vec<RatingRecord>, KeyIndex)> {
        let scope = self.index.scope();
        let decoded = match self.storage.read_all()? {
            None => Decoded { needs_rewrite: true, ..Decoded::default() },
            Some(bytes) => match migrate::decode(&bytes) {
                Ok(decoded) => decoded,
                Err(reason) => {
                    let preserved_at = self.storage.preserve_corrupt(&bytes)?;
                    Decoded {
                        records: Vec::new(),
                        warnings: vec![LoadWarning::Corrupt { reason, preserved_at }],
                        needs_rewrite: true,
                    }
                }
            },
        };

        let Decoded { records, mut warnings, mut needs_rewrite } = decoded;
        let (records, index, merged) = merge_duplicates(scope, records);
        if merged > 0 {
            warnings.push(LoadWarning::DuplicateRows { merged });
            needs_rewrite = true;
        }

        if needs_rewrite {
            self.storage.write_all(&migrate::encode(&records)?)?;
        }

        let location = self.storage.location();
        for w in &warnings {
            warn!(dataset = %location, "{w}");
        }
        self.warnings.extend(warnings);

        Ok((records, index))
    }

    /// Insert or replace the record with the same identity.
    pub fn upsert(&mut self, record: RatingRecord) -> Result<UpsertResult> {
        validate_record(&record, &self.modality)?;

        let _lock = self.storage.lock_exclusive()?;
        let (mut records, mut index) = self.load_locked()?;

        let id = RecordId::of(index.scope(), &record);
        let outcome = match index.position(&id) {
            Some(pos) => {
                records[pos] = record;
                UpsertOutcome::Updated
            }
            None => {
                index.insert(id, records.len());
                records.push(record);
                UpsertOutcome::Inserted
            }
        };

        let bytes = migrate::encode(&records)?;
        self.storage.write_all(&bytes)?;

        self.records = records;
        self.index = index;

        info!(
            dataset = %self.storage.location(),
            outcome = ?outcome,
            records = self.records.len(),
            "rating saved"
        );

        Ok(UpsertResult { outcome, dataset_len: self.records.len() })
    }

    /// Previous submission for this item. Under `ItemOnly` scope the rater
    /// name does not take part in the match.
    pub fn find(&self, rater_name: &str, filename: &str, method: &str) -> Option<&RatingRecord> {
        let id = RecordId::new(self.scope(), rater_name, ItemKey::new(method, filename));
        self.index.position(&id).and_then(|pos| self.records.get(pos))
    }

    /// Keys of every rated item, optionally only those rated by `rater_name`.
    pub fn rated_keys(&self, rater_name: Option<&str>) -> HashSet<ItemKey> {
        self.records
            .iter()
            .filter(|r| rater_name.map_or(true, |name| r.rater.name == name))
            .map(RatingRecord::key)
            .collect()
    }

    /// How many of `items` are rated.
    pub fn progress(&self, items: &[ItemKey], rater_name: Option<&str>) -> Progress {
        let rated = self.rated_keys(rater_name);
        let known: HashSet<&ItemKey> = items.iter().collect();
        Progress {
            completed: known.iter().filter(|k| rated.contains(**k)).count(),
            total: items.len(),
        }
    }

    pub fn summary(&self) -> DatasetSummary {
        let raters: BTreeSet<&str> = self.records.iter().map(|r| r.rater.name.as_str()).collect();
        let methods: BTreeSet<&str> = self.records.iter().map(|r| r.method.as_str()).collect();
        DatasetSummary {
            records: self.records.len(),
            raters: raters.len(),
            methods: methods.len(),
            last_submitted_at: self.records.iter().filter_map(|r| r.submitted_at).max(),
        }
    }

    /// Dataset as CSV in full schema, optionally only one rater's rows.
    pub fn export_csv(&self, rater_name: Option<&str>) -> Result<Vec<u8>> {
        let rows = self
            .records
            .iter()
            .filter(|r| rater_name.map_or(true, |name| r.rater.name == name));
        Ok(migrate::encode(rows)?)
    }
}
