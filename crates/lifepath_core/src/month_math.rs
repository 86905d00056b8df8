//! Month-index arithmetic over `jiff` civil dates.
//!
//! The simulation is anchored to a first-of-month date and addresses time
//! as whole months from that anchor. jiff `Span` arithmetic is correct but
//! heavier than needed for this, so the helpers here do direct calendar
//! math (year/month normalization, no `Span` allocation) and always pin
//! the day to 1.

use jiff::civil::Date;

/// Clamp a date to the first of its month.
#[inline]
pub fn first_of_month(d: Date) -> Date {
    jiff::civil::date(d.year(), d.month(), 1)
}

/// Add `n` months to a date, pinning the day to 1.
///
/// Negative `n` walks backwards. Month overflow normalizes into the year
/// via euclidean division, so `2026-01 + (-1)` is `2025-12`.
#[inline]
pub fn add_months(d: Date, n: i32) -> Date {
    let total = d.year() as i32 * 12 + d.month() as i32 - 1 + n;
    let year = total.div_euclid(12) as i16;
    let month = (total.rem_euclid(12) + 1) as i8;
    jiff::civil::date(year, month, 1)
}

/// Whole months between two dates, ignoring days (`d2 - d1`).
///
/// Positive when `d2` is in a later month than `d1`.
#[inline]
pub fn months_between(d1: Date, d2: Date) -> i32 {
    (d2.year() as i32 - d1.year() as i32) * 12 + (d2.month() as i32 - d1.month() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    #[test]
    fn test_first_of_month() {
        assert_eq!(first_of_month(date(2026, 3, 17)), date(2026, 3, 1));
        assert_eq!(first_of_month(date(2026, 3, 1)), date(2026, 3, 1));
    }

    #[test]
    fn test_add_months_basic() {
        assert_eq!(add_months(date(2026, 1, 1), 0), date(2026, 1, 1));
        assert_eq!(add_months(date(2026, 1, 1), 1), date(2026, 2, 1));
        assert_eq!(add_months(date(2026, 1, 1), 11), date(2026, 12, 1));
        assert_eq!(add_months(date(2026, 1, 1), 12), date(2027, 1, 1));
        assert_eq!(add_months(date(2026, 7, 1), 18), date(2028, 1, 1));
    }

    #[test]
    fn test_add_months_negative() {
        assert_eq!(add_months(date(2026, 1, 1), -1), date(2025, 12, 1));
        assert_eq!(add_months(date(2026, 3, 1), -15), date(2024, 12, 1));
    }

    #[test]
    fn test_add_months_pins_day() {
        assert_eq!(add_months(date(2026, 1, 31), 1), date(2026, 2, 1));
    }

    #[test]
    fn test_months_between() {
        assert_eq!(months_between(date(2026, 1, 1), date(2026, 1, 31)), 0);
        assert_eq!(months_between(date(2026, 1, 1), date(2026, 7, 1)), 6);
        assert_eq!(months_between(date(2026, 1, 1), date(2027, 1, 1)), 12);
        assert_eq!(months_between(date(2026, 7, 1), date(2026, 1, 1)), -6);
    }

    #[test]
    fn test_roundtrip_with_between() {
        let anchor = date(2026, 1, 1);
        for n in [-25, -1, 0, 1, 5, 12, 13, 120] {
            assert_eq!(months_between(anchor, add_months(anchor, n)), n);
        }
    }
}
