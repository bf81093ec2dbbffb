use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("month filter requires a year")]
    MonthWithoutYear,

    #[error("day filter requires a year and a month")]
    DayWithoutMonth,

    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("{year:04}-{month:02} has no day {day}")]
    InvalidDay { year: i32, month: u32, day: u32 },

    #[error("year {0} is outside the supported calendar range")]
    YearOutOfRange(i32),
}

/// Calendar scope of a readings query.
///
/// Finer components always carry every coarser one, so a value of this type
/// can never describe a month without its year or a day without its month.
/// Build it with [`DateFilter::from_parts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum DateFilter {
    #[default]
    All,
    Year { year: i32 },
    YearMonth { year: i32, month: u32 },
    YearMonthDay { date: NaiveDate },
}

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.and_time(NaiveTime::default()).and_utc(),
            end: end.and_time(NaiveTime::default()).and_utc(),
        }
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.start <= *instant && *instant < self.end
    }
}

impl DateFilter {
    pub fn from_parts(
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
    ) -> Result<Self, FilterError> {
        // Hierarchy is checked before any value, so arm order matters
        let filter = match (year, month, day) {
            (None, None, None) => DateFilter::All,
            (None, Some(_), _) => return Err(FilterError::MonthWithoutYear),
            (_, None, Some(_)) => return Err(FilterError::DayWithoutMonth),
            (Some(year), None, None) => DateFilter::Year { year },
            (Some(year), Some(month), None) => DateFilter::YearMonth { year, month },
            (Some(year), Some(month), Some(day)) => {
                check_month(month)?;
                let date = NaiveDate::from_ymd_opt(year, month, day)
                    .ok_or(FilterError::InvalidDay { year, month, day })?;
                DateFilter::YearMonthDay { date }
            }
        };

        filter.range()?;
        Ok(filter)
    }

    /// Interval covered by the filter, `None` when every reading matches.
    ///
    /// Values built through [`DateFilter::from_parts`] never fail here; a
    /// hand-built variant with an impossible month or year does.
    pub fn range(&self) -> Result<Option<DateRange>, FilterError> {
        let (start, end) = match *self {
            DateFilter::All => return Ok(None),
            DateFilter::Year { year } => {
                let start = first_of_month(year, 1)?;
                let end = first_of_month(next_year(year)?, 1)?;
                (start, end)
            }
            DateFilter::YearMonth { year, month } => {
                check_month(month)?;
                let start = first_of_month(year, month)?;
                let end = if month == 12 {
                    first_of_month(next_year(year)?, 1)?
                } else {
                    first_of_month(year, month + 1)?
                };
                (start, end)
            }
            DateFilter::YearMonthDay { date } => {
                let end = date
                    .succ_opt()
                    .ok_or(FilterError::YearOutOfRange(date.year()))?;
                (date, end)
            }
        };

        Ok(Some(DateRange::from_dates(start, end)))
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateFilter::All => f.write_str("all"),
            DateFilter::Year { year } => write!(f, "{:04}", year),
            DateFilter::YearMonth { year, month } => write!(f, "{:04}-{:02}", year, month),
            DateFilter::YearMonthDay { date } => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

fn check_month(month: u32) -> Result<(), FilterError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(FilterError::InvalidMonth(month))
    }
}

fn next_year(year: i32) -> Result<i32, FilterError> {
    year.checked_add(1).ok_or(FilterError::YearOutOfRange(year))
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate, FilterError> {
    NaiveDate::from_ymd_opt(year, month, 1).ok_or(FilterError::YearOutOfRange(year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_no_filters_is_all() {
        let filter = DateFilter::from_parts(None, None, None).unwrap();
        assert_eq!(filter, DateFilter::All);
        assert_eq!(filter.range(), Ok(None));
    }

    #[test]
    fn test_year_range() {
        let range = DateFilter::from_parts(Some(2024), None, None)
            .unwrap()
            .range()
            .unwrap()
            .unwrap();
        assert_eq!(range.start, utc(2024, 1, 1));
        assert_eq!(range.end, utc(2025, 1, 1));
    }

    #[test]
    fn test_month_range_wraps_december() {
        let range = DateFilter::from_parts(Some(2023), Some(12), None)
            .unwrap()
            .range()
            .unwrap()
            .unwrap();
        assert_eq!(range.start, utc(2023, 12, 1));
        assert_eq!(range.end, utc(2024, 1, 1));

        let range = DateFilter::from_parts(Some(2024), Some(2), None)
            .unwrap()
            .range()
            .unwrap()
            .unwrap();
        assert_eq!(range.end, utc(2024, 3, 1));
    }

    #[test]
    fn test_day_range() {
        let range = DateFilter::from_parts(Some(2024), Some(2), Some(29))
            .unwrap()
            .range()
            .unwrap()
            .unwrap();
        assert_eq!(range.start, utc(2024, 2, 29));
        assert_eq!(range.end, utc(2024, 3, 1));
        assert!(range.contains(&Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap()));
        assert!(!range.contains(&utc(2024, 3, 1)));
    }

    #[test]
    fn test_month_without_year_rejected() {
        assert_eq!(
            DateFilter::from_parts(None, Some(5), None),
            Err(FilterError::MonthWithoutYear)
        );
        assert_eq!(
            DateFilter::from_parts(None, Some(5), Some(3)),
            Err(FilterError::MonthWithoutYear)
        );
    }

    #[test]
    fn test_day_without_month_rejected() {
        assert_eq!(
            DateFilter::from_parts(Some(2024), None, Some(3)),
            Err(FilterError::DayWithoutMonth)
        );
        assert_eq!(
            DateFilter::from_parts(None, None, Some(3)),
            Err(FilterError::DayWithoutMonth)
        );
    }

    #[test]
    fn test_hierarchy_checked_before_values() {
        // Out-of-range values still report the structural problem
        assert_eq!(
            DateFilter::from_parts(None, Some(13), None),
            Err(FilterError::MonthWithoutYear)
        );
        assert_eq!(
            DateFilter::from_parts(Some(2024), None, Some(40)),
            Err(FilterError::DayWithoutMonth)
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(
            DateFilter::from_parts(Some(2024), Some(13), None),
            Err(FilterError::InvalidMonth(13))
        );
        assert_eq!(
            DateFilter::from_parts(Some(2024), Some(0), Some(1)),
            Err(FilterError::InvalidMonth(0))
        );
        assert_eq!(
            DateFilter::from_parts(Some(2023), Some(2), Some(29)),
            Err(FilterError::InvalidDay {
                year: 2023,
                month: 2,
                day: 29
            })
        );
        assert_eq!(
            DateFilter::from_parts(Some(i32::MAX), None, None),
            Err(FilterError::YearOutOfRange(i32::MAX))
        );
    }

    #[test]
    fn test_hand_built_variant_is_checked() {
        let filter = DateFilter::YearMonth {
            year: 2024,
            month: 14,
        };
        assert_eq!(filter.range(), Err(FilterError::InvalidMonth(14)));
    }

    #[test]
    fn test_display() {
        assert_eq!(DateFilter::All.to_string(), "all");
        assert_eq!(
            DateFilter::from_parts(Some(2024), Some(3), Some(9))
                .unwrap()
                .to_string(),
            "2024-03-09"
        );
    }
}
