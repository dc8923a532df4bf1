//! Date macros in subject lines: `$now` and `$last_week`.

use std::fmt::Write as _;

use chrono::{Days, Local, NaiveDate};

use crate::error::ConfigError;

pub const NOW_TOKEN: &str = "$now";
pub const LAST_WEEK_TOKEN: &str = "$last_week";

/// Source of "today".
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The local system date.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock pinned to one date.
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Reject strftime patterns a date cannot be rendered with, such as
/// unknown specifiers or time-of-day fields like `%H`.
pub fn check_format(format: &str) -> Result<(), ConfigError> {
    render_date(NaiveDate::default(), format).map(drop)
}

/// Replace every `$now` with `today` and every `$last_week` with
/// `today - 7 days`, both rendered with `format`.
///
/// The format is applied even when the template has no tokens, so a bad
/// pattern is reported on every send.
pub fn expand(template: &str, format: &str, today: NaiveDate) -> Result<String, ConfigError> {
    let last_week = today.checked_sub_days(Days::new(7)).unwrap_or(today);
    let now = render_date(today, format)?;
    let last_week = render_date(last_week, format)?;
    Ok(template
        .replace(NOW_TOKEN, &now)
        .replace(LAST_WEEK_TOKEN, &last_week))
}

// chrono reports unrenderable items through `fmt::Error`; `to_string()`
// would panic on it.
fn render_date(date: NaiveDate, format: &str) -> Result<String, ConfigError> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).map_err(|_| ConfigError::InvalidValue {
        key: "mail.format".into(),
        message: format!("unsupported date pattern {format:?}"),
    })?;
    Ok(out)
}
