use chrono::{Duration as ChronoDur, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/* ───────────────────── Excel date-serial utilities ───────────────────
Excel's serial date system:
  Serial 1  = 1900-01-01
  Serial 60 = 1900-02-29  (phantom – doesn't exist, but Excel thinks it does)
  Serial 61 = 1900-03-01
Base date = 1899-12-31 so that serial 1 = base + 1 day = 1900-01-01.
------------------------------------------------------------------- */

const EXCEL_EPOCH: NaiveDate = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
const PHANTOM_LEAP_CUTOVER: NaiveDate = NaiveDate::from_ymd_opt(1900, 3, 1).unwrap();

/// Largest serial Excel accepts (9999-12-31).
pub const MAX_DATE_SERIAL: f64 = 2_958_465.0;

pub fn datetime_to_serial(dt: &NaiveDateTime) -> f64 {
    let days = (dt.date() - EXCEL_EPOCH).num_days();
    let serial_days = if dt.date() >= PHANTOM_LEAP_CUTOVER {
        days + 1
    } else {
        days
    };
    let secs_in_day = dt.time().num_seconds_from_midnight() as f64;
    serial_days as f64 + secs_in_day / 86_400.0
}

/// Epoch a workbook counts its date serials from.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DateSystem {
    /// Serial 1 is 1900-01-01, with the phantom 1900-02-29 at serial 60.
    #[default]
    V1900,
    /// Serial 0 is 1904-01-01, as saved by older Mac workbooks.
    V1904,
}

const EPOCH_1904: NaiveDate = NaiveDate::from_ymd_opt(1904, 1, 1).unwrap();

/// 1904-01-01 expressed as a 1900-system serial.
pub const SERIAL_1904_OFFSET: f64 = 1462.0;

/// Convert a 1900-system serial number to a timestamp.
///
/// Returns `None` for serials outside the range Excel can display
/// (negative or past 9999-12-31), which readers surface as plain numbers.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    serial_to_datetime_in(serial, DateSystem::V1900)
}

/// Convert a serial number counted in `system` to a timestamp.
pub fn serial_to_datetime_in(serial: f64, system: DateSystem) -> Option<NaiveDateTime> {
    let max = match system {
        DateSystem::V1900 => MAX_DATE_SERIAL,
        DateSystem::V1904 => MAX_DATE_SERIAL - SERIAL_1904_OFFSET,
    };
    if !serial.is_finite() || !(0.0..=max).contains(&serial) {
        return None;
    }
    // Rounded before splitting, so a fraction within half a second of
    // midnight lands on the following day.
    let total_secs = (serial * 86_400.0).round() as i64;
    let days = total_secs.div_euclid(86_400);
    let secs = total_secs.rem_euclid(86_400) as u32;

    let date = match system {
        // Serial 60 is phantom 1900-02-29; map to 1900-02-28
        DateSystem::V1900 if days == 60 => NaiveDate::from_ymd_opt(1900, 2, 28)?,
        DateSystem::V1900 => {
            let offset = if days < 60 { days } else { days - 1 };
            EXCEL_EPOCH.checked_add_signed(ChronoDur::days(offset))?
        }
        DateSystem::V1904 => EPOCH_1904.checked_add_signed(ChronoDur::days(days))?,
    };
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)?;
    Some(date.and_time(time))
}

/// Coarse value category, used when comparing row shapes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    Empty,
    Number,
    Text,
    Boolean,
    Date,
    Error,
}

/// A typed cell value as supplied by a workbook reader.
///
/// This is the stored value, not a formula result produced by evaluation;
/// readers fill it with the cached result when the container has one.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value"))]
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Int(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Error literal such as `#DIV/0!`, kept verbatim.
    Error(String),
    #[default]
    Empty,
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Boolean(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Date(d) => write!(f, "{d}"),
            CellValue::DateTime(dt) => write!(f, "{dt}"),
            CellValue::Error(code) => write!(f, "{code}"),
            CellValue::Empty => Ok(()),
        }
    }
}

impl CellValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CellValue::Int(_) | CellValue::Number(_) => ValueKind::Number,
            CellValue::Text(s) if s.trim().is_empty() => ValueKind::Empty,
            CellValue::Text(_) => ValueKind::Text,
            CellValue::Boolean(_) => ValueKind::Boolean,
            CellValue::Date(_) | CellValue::DateTime(_) => ValueKind::Date,
            CellValue::Error(_) => ValueKind::Error,
            CellValue::Empty => ValueKind::Empty,
        }
    }

    /// Empty cells and whitespace-only text both count as blank.
    pub fn is_blank(&self) -> bool {
        self.kind() == ValueKind::Empty
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, CellValue::Date(_) | CellValue::DateTime(_))
    }

    pub fn as_serial_number(&self) -> Option<f64> {
        match self {
            CellValue::Date(d) => Some(datetime_to_serial(&d.and_time(NaiveTime::MIN))),
            CellValue::DateTime(dt) => Some(datetime_to_serial(dt)),
            CellValue::Int(i) => Some(*i as f64),
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Build a date or date-time value from a 1900-system serial number,
    /// falling back to a plain number when the serial is out of range.
    pub fn from_serial_number(serial: f64) -> Self {
        Self::from_serial_number_in(serial, DateSystem::V1900)
    }

    pub fn from_serial_number_in(serial: f64, system: DateSystem) -> Self {
        match serial_to_datetime_in(serial, system) {
            Some(dt) if dt.time() == NaiveTime::MIN => CellValue::Date(dt.date()),
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::Number(serial),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(value as i64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
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

impl From<NaiveDate> for CellValue {
    fn from(value: NaiveDate) -> Self {
        CellValue::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_roundtrip_skips_phantom_leap_day() {
        let march_first = NaiveDate::from_ymd_opt(1900, 3, 1)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(datetime_to_serial(&march_first), 61.0);
        assert_eq!(serial_to_datetime(61.0), Some(march_first));
        assert_eq!(
            serial_to_datetime(60.0).map(|dt| dt.date()),
            NaiveDate::from_ymd_opt(1900, 2, 28)
        );
    }

    #[test]
    fn fraction_rounding_to_midnight_carries_a_day() {
        let next_day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            serial_to_datetime(45_292.999_999_9),
            Some(next_day.and_time(NaiveTime::MIN))
        );
        assert_eq!(
            CellValue::from_serial_number(45_292.999_999_9),
            CellValue::Date(next_day)
        );
        assert_eq!(
            serial_to_datetime(45_292.5).map(|dt| dt.time()),
            NaiveTime::from_hms_opt(12, 0, 0)
        );
    }

    #[test]
    fn date_1904_serials_are_offset() {
        assert_eq!(
            serial_to_datetime_in(0.0, DateSystem::V1904),
            NaiveDate::from_ymd_opt(1904, 1, 1).map(|d| d.and_time(NaiveTime::MIN))
        );
        for serial in [1.0, 43_830.25, 45_000.75] {
            assert_eq!(
                serial_to_datetime_in(serial, DateSystem::V1904),
                serial_to_datetime(serial + SERIAL_1904_OFFSET),
                "{serial}"
            );
        }
        assert_eq!(
            CellValue::from_serial_number_in(MAX_DATE_SERIAL, DateSystem::V1904),
            CellValue::Number(MAX_DATE_SERIAL)
        );
    }

    #[test]
    fn out_of_range_serial_stays_numeric() {
        assert_eq!(CellValue::from_serial_number(-3.0), CellValue::Number(-3.0));
        assert_eq!(
            CellValue::from_serial_number(45_292.0),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn whitespace_text_is_blank() {
        assert!(CellValue::Text("   ".into()).is_blank());
        assert!(CellValue::Empty.is_blank());
        assert_eq!(CellValue::from("Region").kind(), ValueKind::Text);
        assert_eq!(CellValue::from(3).kind(), ValueKind::Number);
    }
}
