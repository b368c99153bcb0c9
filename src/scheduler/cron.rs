//! Five-field cron expressions (`min hour dom mon dow`)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};

use crate::{Error, Result};

/// Upper bound on the minute-by-minute search in [`CronExpr::next_after`]
const MAX_SEARCH_MINUTES: i64 = 366 * 24 * 60;

/// Parsed cron expression
///
/// Supports `*`, single values, ranges (`1-5`), lists (`13,28`) and steps
/// (`*/2`, `10-50/20`). Day-of-week accepts 0-7 with both 0 and 7 meaning
/// Sunday. When day-of-month and day-of-week are both restricted, a time
/// matches if either matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minute: Field,
    hour: Field,
    day_of_month: Field,
    month: Field,
    day_of_week: Field,
}

/// Allowed values of one field as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Field {
    bits: u64,
    any: bool,
}

impl Field {
    fn parse(raw: &str, min: u32, max: u32, sunday_wraps: bool) -> Result<Self> {
        let full = (min..=max).fold(0_u64, |bits, v| bits | (1 << v));
        let mut bits = 0_u64;

        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(Error::Scheduler(format!("empty list item in '{raw}'")));
            }

            let (base, step) = match part.split_once('/') {
                Some((base, step)) => {
                    let step: u32 = step
                        .parse()
                        .map_err(|_| Error::Scheduler(format!("invalid step '{step}'")))?;
                    if step == 0 {
                        return Err(Error::Scheduler("step must be positive".to_string()));
                    }
                    (base, step)
                }
                None => (part, 1),
            };

            let (start, end) = if base == "*" {
                (min, max)
            } else if let Some((a, b)) = base.split_once('-') {
                (value(a, min, max, sunday_wraps)?, value(b, min, max, sunday_wraps)?)
            } else {
                let v = value(base, min, max, sunday_wraps)?;
                if step > 1 { (v, max) } else { (v, v) }
            };
            if start > end {
                return Err(Error::Scheduler(format!("invalid range '{base}'")));
            }

            let mut v = start;
            while v <= end {
                bits |= 1 << v;
                v += step;
            }
        }

        if sunday_wraps && bits & (1 << 7) != 0 {
            bits = (bits & !(1 << 7)) | 1;
        }
        Ok(Self {
            bits,
            any: bits & full == full,
        })
    }

    const fn contains(self, v: u32) -> bool {
        v < 64 && self.bits & (1 << v) != 0
    }
}

fn value(raw: &str, min: u32, max: u32, sunday_wraps: bool) -> Result<u32> {
    let v: u32 = raw
        .trim()
        .parse()
        .map_err(|_| Error::Scheduler(format!("invalid number '{raw}'")))?;
    let upper = if sunday_wraps { 7 } else { max };
    if v < min || v > upper {
        return Err(Error::Scheduler(format!("{v} outside {min}-{upper}")));
    }
    Ok(v)
}

impl CronExpr {
    /// Parse a five-field expression
    ///
    /// # Errors
    ///
    /// Returns `Error::Scheduler` when the field count or any field is invalid
    pub fn parse(expr: &str) -> Result<Self> {
        let parts: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = parts.as_slice() else {
            return Err(Error::Scheduler(format!(
                "expected 5 fields, got {} in '{expr}'",
                parts.len()
            )));
        };

        Ok(Self {
            source: parts.join(" "),
            minute: Field::parse(minute, 0, 59, false)?,
            hour: Field::parse(hour, 0, 23, false)?,
            day_of_month: Field::parse(dom, 1, 31, false)?,
            month: Field::parse(month, 1, 12, false)?,
            day_of_week: Field::parse(dow, 0, 6, true)?,
        })
    }

    /// Expression text as parsed
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the minute containing `dt` is a firing time
    #[must_use]
    pub fn matches<Tz: TimeZone>(&self, dt: &DateTime<Tz>) -> bool {
        if !(self.minute.contains(dt.minute())
            && self.hour.contains(dt.hour())
            && self.month.contains(dt.month()))
        {
            return false;
        }

        let dom = self.day_of_month.contains(dt.day());
        let dow = self
            .day_of_week
            .contains(dt.weekday().num_days_from_sunday());
        match (self.day_of_month.any, self.day_of_week.any) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }

    /// First firing time strictly after `after`, at second zero
    #[must_use]
    pub fn next_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let mut t = after.clone().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        for _ in 0..MAX_SEARCH_MINUTES {
            if self.matches(&t) {
                return Some(t);
            }
            t += Duration::minutes(1);
        }
        None
    }
}

impl FromStr for CronExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
