//! Duplicate detection between a pulled document and local records.

use std::time::Duration;

use crate::models::Record;

/// How far apart two `occurred_at` values may be and still describe the same
/// record during content matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchTolerance(Duration);

impl MatchTolerance {
    /// Timestamps must be equal
    pub const EXACT: Self = Self(Duration::ZERO);

    pub const fn new(window: Duration) -> Self {
        Self(window)
    }

    fn millis(self) -> i64 {
        i64::try_from(self.0.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Decides whether a remote record already has a local counterpart.
///
/// Rules, first match wins:
/// 1. the remote id is present and non-zero and a local record carries it;
/// 2. description is byte-equal, amount numerically equal and `occurred_at`
///    within the tolerance.
///
/// Rule 2 may merge two distinct but identical entries. That is accepted in
/// exchange for never inserting duplicates of documents without reliable ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResolver {
    tolerance: MatchTolerance,
}

impl MatchResolver {
    pub const fn new(tolerance: MatchTolerance) -> Self {
        Self { tolerance }
    }

    pub const fn tolerance(&self) -> MatchTolerance {
        self.tolerance
    }

    /// Whether `remote` exists among `locals`
    pub fn exists(&self, remote: &Record, locals: &[Record]) -> bool {
        self.find_match(remote, locals).is_some()
    }

    /// Index of the local counterpart of `remote`, if any
    pub fn find_match(&self, remote: &Record, locals: &[Record]) -> Option<usize> {
        if let Some(id) = remote.identity() {
            if let Some(index) = locals.iter().position(|local| local.identity() == Some(id)) {
                return Some(index);
            }
        }

        let tolerance = self.tolerance.millis();
        locals.iter().position(|local| {
            local.description == remote.description
                && local.amount == remote.amount
                && local.occurred_at.abs_diff(remote.occurred_at) <= tolerance.unsigned_abs()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const NINE_AM: i64 = 1_704_099_600_000; // 2024-01-01T09:00:00Z

    fn coffee(id: Option<i64>, occurred_at: i64) -> Record {
        let mut record = Record::new(1, Decimal::new(350, 2), "Coffee").occurred_at(occurred_at);
        record.id = id;
        record
    }

    fn full() -> MatchResolver {
        MatchResolver::new(MatchTolerance::new(Duration::from_secs(60)))
    }

    fn strict() -> MatchResolver {
        MatchResolver::new(MatchTolerance::EXACT)
    }

    #[test]
    fn matching_id_wins_even_when_content_differs() {
        let locals = vec![coffee(Some(4), NINE_AM)];
        let mut remote = coffee(Some(4), NINE_AM + 3_600_000);
        remote.description = "Espresso".to_string();
        assert_eq!(strict().find_match(&remote, &locals), Some(0));
    }

    #[test]
    fn zero_id_falls_back_to_content_within_tolerance() {
        let locals = vec![coffee(Some(1), NINE_AM + 30_000)];
        let remote = coffee(Some(0), NINE_AM);
        assert!(full().exists(&remote, &locals));
    }

    #[test]
    fn two_minutes_apart_is_new_under_strict_tolerance() {
        let locals = vec![coffee(Some(1), NINE_AM + 120_000)];
        let remote = coffee(Some(0), NINE_AM);
        assert!(!strict().exists(&remote, &locals));
        assert!(!full().exists(&remote, &locals));
    }

    #[test]
    fn amount_compares_numerically() {
        let locals = vec![coffee(Some(1), NINE_AM)];
        let mut remote = coffee(None, NINE_AM);
        remote.amount = Decimal::new(35, 1);
        assert!(strict().exists(&remote, &locals));
    }

    #[test]
    fn unknown_id_still_matches_by_content() {
        let locals = vec![coffee(Some(1), NINE_AM)];
        let remote = coffee(Some(99), NINE_AM);
        assert_eq!(strict().find_match(&remote, &locals), Some(0));
    }

    #[test]
    fn description_must_be_byte_equal() {
        let locals = vec![coffee(Some(1), NINE_AM)];
        let mut remote = coffee(None, NINE_AM);
        remote.description = "coffee".to_string();
        assert!(!full().exists(&remote, &locals));
    }
}
