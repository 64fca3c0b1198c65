use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};

/// A runtime cell value as submitted to a worksheet.
///
/// Every Rust primitive converts into exactly one variant via `From`, and any
/// other `Display` type can be stored as text with [`CellValue::display`].
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CellValue {
    /// Empty / unset cell value.
    #[default]
    Empty,
    /// Signed integer of any width up to 64 bits.
    Int(i64),
    /// Unsigned integer of any width up to 64 bits.
    UInt(u64),
    /// Single precision float; written at `f32` fidelity.
    Float32(f32),
    /// Double precision float.
    Float64(f64),
    /// Plain string.
    Text(String),
    /// Raw bytes, written as (lossy) UTF-8 text.
    Bytes(Vec<u8>),
    /// Elapsed time, written as a fraction of days.
    Duration(TimeDelta),
    /// Wall-clock timestamp, written as a serial date number.
    DateTime(NaiveDateTime),
    /// Boolean.
    Bool(bool),
}

impl CellValue {
    /// Returns true if the value is [`CellValue::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Store any displayable value as text.
    pub fn display(value: impl fmt::Display) -> Self {
        CellValue::Text(value.to_string())
    }
}

macro_rules! impl_from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for CellValue {
            fn from(value: $ty) -> Self {
                CellValue::Int(i64::from(value))
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for CellValue {
            fn from(value: $ty) -> Self {
                CellValue::UInt(u64::from(value))
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<isize> for CellValue {
    fn from(value: isize) -> Self {
        // `isize` is at most 64 bits on every supported target.
        CellValue::Int(value as i64)
    }
}

impl From<usize> for CellValue {
    fn from(value: usize) -> Self {
        CellValue::UInt(value as u64)
    }
}

impl From<f32> for CellValue {
    fn from(value: f32) -> Self {
        CellValue::Float32(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float64(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<char> for CellValue {
    fn from(value: char) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for CellValue {
    fn from(value: Vec<u8>) -> Self {
        CellValue::Bytes(value)
    }
}

impl From<&[u8]> for CellValue {
    fn from(value: &[u8]) -> Self {
        CellValue::Bytes(value.to_vec())
    }
}

impl From<TimeDelta> for CellValue {
    fn from(value: TimeDelta) -> Self {
        CellValue::Duration(value)
    }
}

impl From<std::time::Duration> for CellValue {
    fn from(value: std::time::Duration) -> Self {
        match TimeDelta::from_std(value) {
            Ok(delta) => CellValue::Duration(delta),
            // Beyond `TimeDelta`'s range; the day count is still representable.
            Err(_) => CellValue::Float64(value.as_secs_f64() / 86_400.0),
        }
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::DateTime(value.and_time(NaiveTime::MIN))
    }
}

/// Zoned timestamps are written as their UTC instant.
impl<Tz: TimeZone> From<DateTime<Tz>> for CellValue {
    fn from(value: DateTime<Tz>) -> Self {
        CellValue::DateTime(value.naive_utc())
    }
}

impl From<()> for CellValue {
    fn from(_: ()) -> Self {
        CellValue::Empty
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn integers_of_every_width_keep_their_sign_family() {
        assert_eq!(CellValue::from(-3i8), CellValue::Int(-3));
        assert_eq!(CellValue::from(i64::MIN), CellValue::Int(i64::MIN));
        assert_eq!(CellValue::from(200u8), CellValue::UInt(200));
        assert_eq!(CellValue::from(u64::MAX), CellValue::UInt(u64::MAX));
        assert_eq!(CellValue::from(7usize), CellValue::UInt(7));
    }

    #[test]
    fn options_and_unit_map_to_empty() {
        assert_eq!(CellValue::from(None::<i32>), CellValue::Empty);
        assert_eq!(CellValue::from(Some("x")), CellValue::Text("x".into()));
        assert_eq!(CellValue::from(()), CellValue::Empty);
    }

    #[test]
    fn zoned_timestamps_use_utc_instant() {
        let dt = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(CellValue::from(dt), CellValue::DateTime(dt.naive_utc()));
    }

    #[test]
    fn display_stores_text() {
        let addr = std::net::Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(CellValue::display(addr), CellValue::Text("10.0.0.1".into()));
    }
}
