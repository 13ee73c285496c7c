//! Calendar arithmetic for subscription expiry

use time::{util::days_in_year_month, Date, Month, OffsetDateTime};

/// Add whole calendar months to `start`, keeping the time of day and offset.
///
/// When the day of month does not exist in the target month the result is
/// clamped to that month's last day (Jan 31 + 1 month = Feb 28, or Feb 29 in
/// a leap year). Returns `None` if the result falls outside the supported
/// date range.
pub fn add_months(start: OffsetDateTime, months: i32) -> Option<OffsetDateTime> {
    let month_index = i64::from(start.year()) * 12 + i64::from(u8::from(start.month()) - 1);
    let target = month_index.checked_add(i64::from(months))?;

    let year = i32::try_from(target.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(target.rem_euclid(12) + 1).ok()?).ok()?;
    let day = start.day().min(days_in_year_month(year, month));

    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some(start.replace_date(date))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_mid_month_keeps_day() {
        let start = datetime!(2023-01-15 10:30:00 UTC);
        assert_eq!(add_months(start, 1), Some(datetime!(2023-02-15 10:30:00 UTC)));
    }

    #[test]
    fn test_month_end_clamps_in_common_year() {
        let start = datetime!(2023-01-31 08:00:00 UTC);
        assert_eq!(add_months(start, 1), Some(datetime!(2023-02-28 08:00:00 UTC)));
    }

    #[test]
    fn test_month_end_clamps_in_leap_year() {
        let start = datetime!(2024-01-31 08:00:00 UTC);
        assert_eq!(add_months(start, 1), Some(datetime!(2024-02-29 08:00:00 UTC)));
    }

    #[test]
    fn test_thirty_first_into_thirty_day_month() {
        let start = datetime!(2023-03-31 00:00:00 UTC);
        assert_eq!(add_months(start, 1), Some(datetime!(2023-04-30 00:00:00 UTC)));
    }

    #[test]
    fn test_rolls_over_year_boundary() {
        let start = datetime!(2023-11-30 12:00:00 UTC);
        assert_eq!(add_months(start, 3), Some(datetime!(2024-02-29 12:00:00 UTC)));
        assert_eq!(add_months(start, 12), Some(datetime!(2024-11-30 12:00:00 UTC)));
    }

    #[test]
    fn test_december_plus_one() {
        let start = datetime!(2023-12-31 23:59:59 UTC);
        assert_eq!(add_months(start, 1), Some(datetime!(2024-01-31 23:59:59 UTC)));
    }

    #[test]
    fn test_preserves_offset() {
        let start = datetime!(2023-01-31 09:00:00 +05:00);
        let result = add_months(start, 1).unwrap();
        assert_eq!(result, datetime!(2023-02-28 09:00:00 +05:00));
        assert_eq!(result.offset(), start.offset());
    }

    #[test]
    fn test_out_of_range_is_none() {
        let start = datetime!(9999-12-01 00:00:00 UTC);
        assert_eq!(add_months(start, 1), None);
    }
}
