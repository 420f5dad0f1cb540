use std::collections::HashMap;

use crate::{IdentityScope, ItemKey, RatingRecord};

/// Identity of a record under a given scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordId {
    rater: Option<String>,
    item: ItemKey,
}

impl RecordId {
    pub fn new(scope: IdentityScope, rater_name: &str, item: ItemKey) -> Self {
        let rater = match scope {
            IdentityScope::RaterAndItem => Some(rater_name.to_string()),
            IdentityScope::ItemOnly => None,
        };
        Self { rater, item }
    }

    pub fn of(scope: IdentityScope, record: &RatingRecord) -> Self {
        Self::new(scope, &record.rater.name, record.key())
    }
}

/// Position of every record in the dataset, by identity.
#[derive(Clone, Debug)]
pub struct KeyIndex {
    scope: IdentityScope,
    positions: HashMap<RecordId, usize>,
}

impl KeyIndex {
    pub fn new(scope: IdentityScope) -> Self {
        Self { scope, positions: HashMap::new() }
    }

    pub fn scope(&self) -> IdentityScope {
        self.scope
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn insert(&mut self, id: RecordId, position: usize) {
        self.positions.insert(id, position);
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Collapse rows that share an identity. A later row overwrites the earlier
/// one at the earlier row's position, the same way an upsert would.
/// Returns the merged rows, their index and how many rows were folded away.
pub fn merge_duplicates(scope: IdentityScope, rows: Vec<RatingRecord>) -> (Vec<RatingRecord>, KeyIndex, usize) {
    let mut index = KeyIndex::new(scope);
    let mut out: Vec<RatingRecord> = Vec::with_capacity(rows.len());
    let mut merged = 0;

    for row in rows {
        let id = RecordId::of(scope, &row);
        match index.position(&id) {
            Some(pos) => {
                out[pos] = row;
                merged += 1;
            }
            None => {
                index.insert(id, out.len());
                out.push(row);
            }
        }
    }

    (out, index, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rater, Scores};

    fn row(rater: &str, file: &str, s: u8) -> RatingRecord {
        RatingRecord {
            rater: Rater::new(rater, "GH", 1.0),
            modality: "CT".into(),
            method: "m1".into(),
            filename: file.into(),
            scores: Scores::new(s, s, s, s),
            submission_id: None,
            submitted_at: None,
        }
    }

    #[test]
    fn test_later_duplicate_wins_in_place() {
        let rows = vec![row("A", "x.png", 1), row("A", "y.png", 2), row("A", "x.png", 5)];
        let (out, index, merged) = merge_duplicates(IdentityScope::RaterAndItem, rows);

        assert_eq!(merged, 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].filename, "x.png");
        assert_eq!(out[0].scores.sharpness, 5);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_scope_decides_whether_raters_collide() {
        let rows = vec![row("A", "x.png", 1), row("B", "x.png", 4)];

        let (by_rater, _, merged) = merge_duplicates(IdentityScope::RaterAndItem, rows.clone());
        assert_eq!((by_rater.len(), merged), (2, 0));

        let (by_item, _, merged) = merge_duplicates(IdentityScope::ItemOnly, rows);
        assert_eq!((by_item.len(), merged), (1, 1));
        assert_eq!(by_item[0].rater.name, "B");
    }
}
