//! # Predicate Builder
//!
//! Collects optional, independently absent conditions and folds them into one
//! predicate. Every helper skips its clause when its input is absent or empty, so a
//! missing search parameter can never narrow a result set.

use super::expression::{always_true, and, or, Predicate, TypedExpr, Value};
use chrono::{NaiveDate, NaiveDateTime};

/// How collected field predicates are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Every stated field must match
    #[default]
    Exact,
    /// Any stated field may match
    FreeText,
}

impl SearchMode {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("true") => SearchMode::FreeText,
            _ => SearchMode::Exact,
        }
    }

    pub fn is_free_text(&self) -> bool {
        matches!(self, SearchMode::FreeText)
    }
}

/// Tri-state boolean parameter: only literal `true`/`false` filter, anything else is absent
pub fn parse_tri_state(raw: Option<&str>) -> Option<bool> {
    match raw {
        Some("true") => Some(true),
        Some("false") => Some(false),
        _ => None,
    }
}

/// Parse an id, discarding malformed input
pub fn try_get_long(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// OR of case-insensitive substring matches, `None` without values
pub fn lower_like_any(values: Option<&[String]>, column: &TypedExpr<String>) -> Option<Predicate> {
    match values {
        Some(values) if !values.is_empty() => {
            Some(or(values.iter().map(|value| column.lower_like(value))))
        }
        _ => None,
    }
}

/// Inclusive day range over a timestamp column.
///
/// Accepted forms: `YYYY-MM-DD` (that day), `from,to`, `from,` and `,to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn parse(spec: &str) -> Option<Self> {
        fn date(part: &str) -> Result<Option<NaiveDate>, chrono::ParseError> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            NaiveDate::parse_from_str(part, "%Y-%m-%d").map(Some)
        }

        let (from, to) = match spec.split_once(',') {
            Some((from, to)) => (date(from).ok()?, date(to).ok()?),
            None => {
                let day = date(spec).ok()?;
                (day, day)
            }
        };

        if from.is_none() && to.is_none() {
            return None;
        }

        Some(Self { from, to })
    }

    pub fn to_predicate(&self, column: &TypedExpr<NaiveDateTime>) -> Option<Predicate> {
        let mut bounds = Vec::new();
        if let Some(from) = self.from {
            let start = from.and_hms_opt(0, 0, 0)?;
            bounds.push(column.compare(super::expression::CompareOp::GtEq, start));
        }
        if let Some(to) = self.to {
            let end = to.succ_opt()?.and_hms_opt(0, 0, 0)?;
            bounds.push(column.compare(super::expression::CompareOp::Lt, end));
        }
        Some(and(bounds))
    }
}

/// Accumulates optional predicates
#[derive(Debug, Clone, Default)]
pub struct PredicateBuilder {
    predicates: Vec<Predicate>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate if present
    pub fn add(mut self, predicate: Option<Predicate>) -> Self {
        if let Some(predicate) = predicate {
            self.predicates.push(predicate);
        }
        self
    }

    /// Membership filter; skipped when `values` is empty
    pub fn in_values<T, I>(self, values: I, column: &TypedExpr<T>) -> Self
    where
        T: Into<Value>,
        I: IntoIterator<Item = T>,
    {
        let values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            return self;
        }
        let predicate = column.is_in(values);
        self.add(Some(predicate))
    }

    /// Boolean column equals `flag`; skipped when the flag is absent
    pub fn flag(self, flag: Option<bool>, column: &TypedExpr<bool>) -> Self {
        let predicate = flag.map(|flag| column.equal(flag));
        self.add(predicate)
    }

    /// Case-insensitive substring filter, values OR-combined
    pub fn lower_like(self, values: Option<&[String]>, column: &TypedExpr<String>) -> Self {
        let predicate = lower_like_any(values, column);
        self.add(predicate)
    }

    /// Date range filter from a range spec; absent or malformed specs are skipped
    pub fn date_range(self, spec: Option<&str>, column: &TypedExpr<NaiveDateTime>) -> Self {
        let predicate = spec
            .and_then(DateRange::parse)
            .and_then(|range| range.to_predicate(column));
        self.add(predicate)
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Conjunction of everything collected; `TRUE` when nothing was collected
    pub fn and(self) -> Predicate {
        and(self.predicates)
    }

    /// Disjunction of everything collected; `FALSE` when nothing was collected
    pub fn or(self) -> Predicate {
        or(self.predicates)
    }

    /// Combine according to `mode`. In free-text mode the collected field predicates are
    /// OR-combined into one "matches anywhere" condition; with nothing collected there is
    /// nothing to search for and the result is `TRUE`.
    pub fn build(self, mode: SearchMode) -> Predicate {
        match mode {
            SearchMode::Exact => self.and(),
            SearchMode::FreeText if self.is_empty() => always_true(),
            SearchMode::FreeText => self.or(),
        }
    }
}
