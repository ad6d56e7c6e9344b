//! Timestamp utilities

use chrono::{Local, Utc};

/// Current UNIX time in whole seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Local calendar date as `YYYYMMDD`, used to prefix exported report files
pub fn report_date_stamp() -> String {
    Local::now().format("%Y%m%d").to_string()
}
