//! Input-shape validation for bar histories (spec §7).
//!
//! These are the only failures the core surfaces to the caller: an
//! unsorted or duplicated date series, a non-positive price, or a
//! calendar gap wider than the tolerated non-trading window. Everything
//! else (insufficient warmup, a sub-strategy exception mid-run) is
//! recovered locally by the components that hit it.

use thiserror::Error;

use crate::models::BarHistory;

/// Maximum tolerated gap, in calendar days, between two consecutive bars.
pub const MAX_GAP_DAYS: i64 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("bar history is empty")]
    Empty,

    #[error("dates are not strictly increasing: {prev} is not before {next}")]
    UnsortedDates {
        prev: chrono::NaiveDate,
        next: chrono::NaiveDate,
    },

    #[error("duplicate date in bar history: {date}")]
    DuplicateDate { date: chrono::NaiveDate },

    #[error("non-positive {field} price {value} on {date}")]
    NonPositivePrice {
        date: chrono::NaiveDate,
        field: &'static str,
        value: f64,
    },

    #[error("calendar gap of {days} days between {from} and {to} exceeds the {max} day limit")]
    GapTooLarge {
        from: chrono::NaiveDate,
        to: chrono::NaiveDate,
        days: i64,
        max: i64,
    },
}

/// Validate a bar history's shape: strictly increasing unique dates, all
/// four prices positive, and no calendar gap wider than
/// [`MAX_GAP_DAYS`].
pub fn validate_history(history: &BarHistory) -> Result<(), ValidationError> {
    let bars = history.bars();
    if bars.is_empty() {
        return Err(ValidationError::Empty);
    }

    for bar in bars {
        for (field, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if value <= 0.0 {
                return Err(ValidationError::NonPositivePrice {
                    date: bar.date,
                    field,
                    value,
                });
            }
        }
    }

    for pair in bars.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if prev.date == next.date {
            return Err(ValidationError::DuplicateDate { date: prev.date });
        }
        if prev.date > next.date {
            return Err(ValidationError::UnsortedDates {
                prev: prev.date,
                next: next.date,
            });
        }
        let gap = (next.date - prev.date).num_days();
        if gap > MAX_GAP_DAYS {
            return Err(ValidationError::GapTooLarge {
                from: prev.date,
                to: next.date,
                days: gap,
                max: MAX_GAP_DAYS,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Bar;
    use chrono::NaiveDate;

    fn bar(y: i32, m: u32, d: u32, close: f64) -> Bar {
        Bar {
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    #[test]
    fn accepts_clean_history() {
        let h = BarHistory::new(vec![bar(2024, 1, 2, 100.0), bar(2024, 1, 3, 101.0)]);
        assert!(validate_history(&h).is_ok());
    }

    #[test]
    fn rejects_empty() {
        let h = BarHistory::new(vec![]);
        assert_eq!(validate_history(&h), Err(ValidationError::Empty));
    }

    #[test]
    fn rejects_duplicate_date() {
        let h = BarHistory::new(vec![bar(2024, 1, 2, 100.0), bar(2024, 1, 2, 101.0)]);
        assert!(matches!(
            validate_history(&h),
            Err(ValidationError::DuplicateDate { .. })
        ));
    }

    #[test]
    fn rejects_unsorted() {
        let h = BarHistory::new(vec![bar(2024, 1, 3, 101.0), bar(2024, 1, 2, 100.0)]);
        assert!(matches!(
            validate_history(&h),
            Err(ValidationError::UnsortedDates { .. })
        ));
    }

    #[test]
    fn rejects_non_positive_price() {
        let h = BarHistory::new(vec![bar(2024, 1, 2, 100.0), bar(2024, 1, 3, 0.0)]);
        assert!(matches!(
            validate_history(&h),
            Err(ValidationError::NonPositivePrice { .. })
        ));
    }

    #[test]
    fn rejects_wide_gap() {
        let h = BarHistory::new(vec![bar(2024, 1, 1, 100.0), bar(2024, 1, 10, 101.0)]);
        assert!(matches!(
            validate_history(&h),
            Err(ValidationError::GapTooLarge { .. })
        ));
    }

    #[test]
    fn allows_weekend_gap() {
        // Friday -> Monday is a 3-day calendar gap, within tolerance.
        let h = BarHistory::new(vec![bar(2024, 1, 5, 100.0), bar(2024, 1, 8, 101.0)]);
        assert!(validate_history(&h).is_ok());
    }
}
