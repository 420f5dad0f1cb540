//! Navigation over the items of one rater session.
//!
//! The cursor always points inside the visible (filtered) list while that
//! list is non-empty. Running off the end moves it to `Complete` instead of
//! wrapping; only a filter change or an explicit jump brings it back.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Item, ItemKey, RatingsError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    At(usize),
    End,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    All,
    Rated,
    Unrated,
}

impl FilterMode {
    pub fn keeps(self, rated: bool) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Rated => rated,
            FilterMode::Unrated => !rated,
        }
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "rated" => Ok(FilterMode::Rated),
            "unrated" => Ok(FilterMode::Unrated),
            other => Err(format!("unknown filter mode: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorState {
    Active(usize),
    Complete,
}

#[derive(Clone, Debug)]
pub struct SessionCursor {
    all: Vec<Item>,
    visible: Vec<Item>,
    mode: FilterMode,
    current: usize,
    complete: bool,
}

impl SessionCursor {
    pub fn new(items: Vec<Item>) -> Self {
        let complete = items.is_empty();
        Self {
            visible: items.clone(),
            all: items,
            mode: FilterMode::All,
            current: 0,
            complete,
        }
    }

    /// Visible items, in listing order.
    pub fn items(&self) -> &[Item] {
        &self.visible
    }

    /// Every item regardless of filter.
    pub fn all_items(&self) -> &[Item] {
        &self.all
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Item> {
        self.visible.get(self.current)
    }

    /// 1-based position of the current item and the visible count.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.current().map(|_| (self.current + 1, self.visible.len()))
    }

    pub fn state(&self) -> CursorState {
        if self.complete {
            CursorState::Complete
        } else {
            CursorState::Active(self.current)
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn advance(&mut self) -> Step {
        if self.complete {
            return Step::End;
        }
        if self.current + 1 < self.visible.len() {
            self.current += 1;
            Step::At(self.current)
        } else {
            self.complete = true;
            Step::End
        }
    }

    /// No-op once complete.
    pub fn retreat(&mut self) -> usize {
        if !self.complete {
            self.current = self.current.saturating_sub(1);
        }
        self.current
    }

    pub fn jump_to(&mut self, key: &ItemKey) -> Result<usize> {
        let pos = self
            .visible
            .iter()
            .position(|item| &item.key() == key)
            .ok_or_else(|| RatingsError::NotFound(key.clone()))?;
        self.current = pos;
        self.complete = false;
        Ok(pos)
    }

    /// Move forward past rated items, stopping on the first unrated one.
    pub fn skip_rated(&mut self, rated: &HashSet<ItemKey>) -> Step {
        if self.complete {
            return Step::End;
        }
        let mut pos = self.current;
        while pos < self.visible.len() && rated.contains(&self.visible[pos].key()) {
            pos += 1;
        }
        if pos < self.visible.len() {
            self.current = pos;
            Step::At(pos)
        } else {
            self.current = self.visible.len().saturating_sub(1);
            self.complete = true;
            Step::End
        }
    }

    /// Stable filter of the full list; the cursor restarts at its head.
    pub fn reapply_filter(&mut self, mode: FilterMode, rated: &HashSet<ItemKey>) -> &[Item] {
        self.mode = mode;
        self.visible = filter_items(&self.all, mode, rated);
        self.current = 0;
        self.complete = self.visible.is_empty();
        &self.visible
    }

    /// Swap in a fresh listing, keeping the current item if it survived.
    pub fn replace_items(&mut self, items: Vec<Item>, rated: &HashSet<ItemKey>) {
        let current_key = self.current().map(Item::key);
        self.all = items;
        self.visible = filter_items(&self.all, self.mode, rated);

        match current_key.and_then(|k| self.visible.iter().position(|i| i.key() == k)) {
            Some(pos) => self.current = pos,
            None => self.clamp(),
        }
        if self.visible.is_empty() {
            self.complete = true;
        }
    }

    /// Remove an item that cannot be shown. The cursor then sits on the item
    /// that followed it.
    pub fn drop_item(&mut self, key: &ItemKey) -> Option<Item> {
        let removed = self.all.iter().position(|i| &i.key() == key).map(|pos| self.all.remove(pos));
        if let Some(pos) = self.visible.iter().position(|i| &i.key() == key) {
            self.visible.remove(pos);
            if pos < self.current {
                self.current -= 1;
            }
        }
        self.clamp();
        if self.visible.is_empty() {
            self.complete = true;
        }
        removed
    }

    fn clamp(&mut self) {
        if self.current >= self.visible.len() {
            self.current = 0;
        }
    }
}

fn filter_items(items: &[Item], mode: FilterMode, rated: &HashSet<ItemKey>) -> Vec<Item> {
    items
        .iter()
        .filter(|item| mode.keeps(rated.contains(&item.key())))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(names: &[&str]) -> Vec<Item> {
        names
            .iter()
            .map(|n| Item {
                modality: "CT".into(),
                method: "m1".into(),
                filename: n.to_string(),
                source_location: format!("CT/m1/{n}").into(),
            })
            .collect()
    }

    fn keys(names: &[&str]) -> HashSet<ItemKey> {
        names.iter().map(|n| ItemKey::new("m1", *n)).collect()
    }

    #[test]
    fn test_advance_stops_at_end_without_wrapping() {
        let mut c = SessionCursor::new(items(&["a", "b"]));
        assert_eq!(c.advance(), Step::At(1));
        assert_eq!(c.advance(), Step::End);
        assert_eq!(c.state(), CursorState::Complete);
        assert_eq!(c.current_index(), 1);
        assert_eq!(c.advance(), Step::End);
    }

    #[test]
    fn test_retreat_floors_at_zero() {
        let mut c = SessionCursor::new(items(&["a", "b"]));
        assert_eq!(c.retreat(), 0);
        c.advance();
        assert_eq!(c.retreat(), 0);
    }

    #[test]
    fn test_skip_rated_lands_on_first_unrated() {
        let mut c = SessionCursor::new(items(&["A", "B", "C"]));
        assert_eq!(c.skip_rated(&keys(&["A", "B"])), Step::At(2));
        assert_eq!(c.current().unwrap().filename, "C");
    }

    #[test]
    fn test_skip_rated_all_rated_is_end() {
        let mut c = SessionCursor::new(items(&["A", "B", "C"]));
        assert_eq!(c.skip_rated(&keys(&["A", "B", "C"])), Step::End);
        assert!(c.is_complete());
        assert_eq!(c.current_index(), 2);
    }

    #[test]
    fn test_complete_only_left_by_jump_or_filter() {
        let mut c = SessionCursor::new(items(&["A", "B"]));
        c.advance();
        c.advance();
        assert_eq!(c.retreat(), 1);
        assert!(c.is_complete());

        assert_eq!(c.jump_to(&ItemKey::new("m1", "A")).unwrap(), 0);
        assert_eq!(c.state(), CursorState::Active(0));

        c.advance();
        c.advance();
        c.reapply_filter(FilterMode::All, &HashSet::new());
        assert_eq!(c.state(), CursorState::Active(0));
    }

    #[test]
    fn test_jump_to_unknown_key_is_not_found() {
        let mut c = SessionCursor::new(items(&["A"]));
        let err = c.jump_to(&ItemKey::new("m2", "A")).unwrap_err();
        assert!(matches!(err, RatingsError::NotFound(_)));
        assert_eq!(c.current_index(), 0);
    }

    #[test]
    fn test_filter_is_stable_and_jump_respects_it() {
        let mut c = SessionCursor::new(items(&["A", "B", "C", "D"]));
        let rated = keys(&["D", "B"]);

        let names: Vec<&str> = c
            .reapply_filter(FilterMode::Rated, &rated)
            .iter()
            .map(|i| i.filename.as_str())
            .collect();
        assert_eq!(names, vec!["B", "D"]);

        let names: Vec<String> = c
            .reapply_filter(FilterMode::Unrated, &rated)
            .iter()
            .map(|i| i.filename.clone())
            .collect();
        assert_eq!(names, vec!["A", "C"]);
        assert!(c.jump_to(&ItemKey::new("m1", "B")).is_err());
    }

    #[test]
    fn test_empty_filter_result_is_complete() {
        let mut c = SessionCursor::new(items(&["A"]));
        assert!(c.reapply_filter(FilterMode::Rated, &HashSet::new()).is_empty());
        assert!(c.is_complete());
        assert_eq!(c.advance(), Step::End);
    }

    #[test]
    fn test_drop_item_keeps_cursor_in_bounds() {
        let mut c = SessionCursor::new(items(&["A", "B", "C"]));
        c.advance();
        c.drop_item(&ItemKey::new("m1", "B"));
        assert_eq!(c.current().unwrap().filename, "C");

        c.drop_item(&ItemKey::new("m1", "C"));
        assert_eq!(c.current_index(), 0);
        assert_eq!(c.current().unwrap().filename, "A");

        assert_eq!(c.position(), Some((1, 1)));

        c.drop_item(&ItemKey::new("m1", "A"));
        assert!(c.is_empty());
        assert_eq!(c.position(), None);
        assert!(c.is_complete());
    }

    #[test]
    fn test_replace_items_follows_current_item() {
        let mut c = SessionCursor::new(items(&["A", "B", "C"]));
        c.advance();
        c.advance();
        c.replace_items(items(&["C", "D"]), &HashSet::new());
        assert_eq!(c.current().unwrap().filename, "C");

        c.replace_items(items(&["X"]), &HashSet::new());
        assert_eq!(c.current_index(), 0);
    }
}
