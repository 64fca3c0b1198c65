//! Serial date/time numbers.
//!
//! SpreadsheetML stores timestamps as fractional days since the workbook epoch
//! and leaves the display to a date number format in `styles.xml`.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use sheetstream_model::DateSystem;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert a timestamp to its serial number in `system`.
///
/// Returns `None` for timestamps before the epoch or after 9999-12-31, which
/// Excel cannot represent.
pub fn datetime_to_serial(dt: NaiveDateTime, system: DateSystem) -> Option<f64> {
    let date = dt.date();
    if date.year() > 9999 {
        return None;
    }

    let epoch = match system {
        DateSystem::Excel1900 => {
            if date < NaiveDate::from_ymd_opt(1900, 1, 1)? {
                return None;
            }
            // Serial 60 is the phantom 1900-02-29 kept for Lotus 1-2-3
            // compatibility, so dates after it are offset by one day.
            if date < NaiveDate::from_ymd_opt(1900, 3, 1)? {
                NaiveDate::from_ymd_opt(1899, 12, 31)?
            } else {
                NaiveDate::from_ymd_opt(1899, 12, 30)?
            }
        }
        DateSystem::Excel1904 => {
            let epoch = NaiveDate::from_ymd_opt(1904, 1, 1)?;
            if date < epoch {
                return None;
            }
            epoch
        }
    };

    let days = (date - epoch).num_days() as f64;
    let time = dt.time();
    let seconds =
        f64::from(time.num_seconds_from_midnight()) + f64::from(time.nanosecond()) / 1e9;
    Some(days + seconds / SECONDS_PER_DAY)
}

/// Elapsed time as a (possibly negative) fraction of days.
pub fn duration_to_days(delta: TimeDelta) -> f64 {
    let seconds = delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1e9;
    seconds / SECONDS_PER_DAY
}
