//! Spanish date and time expressions

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Weekday};
use regex::Regex;

/// Default hour when a day is named without a time
const DEFAULT_HOUR: u32 = 9;

static RELATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\ben\s+(\d+|un|una|media)\s*(horas?|hrs?|h|minutos?|mins?|m)\b",
    )
    .expect("valid regex")
});

static CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\ba\s+las?\s+(\d{1,2})(?::(\d{2}))?|\b(\d{1,2}):(\d{2})|\b(\d{1,2})\s*(?:am|pm)\b)\s*(am|pm|de la tarde|de la noche|de la mañana|de la manana)?",
    )
    .expect("valid regex")
});

static DAY_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:(?:para|el|este|esta)\s+)?(?:pasado\s+ma[ñn]ana|ma[ñn]ana|hoy|lunes|martes|mi[ée]rcoles|jueves|viernes|s[áa]bado|domingo)\b",
    )
    .expect("valid regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").expect("valid regex"));

static DMY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").expect("valid regex")
});

const WEEKDAYS: [(&str, Weekday); 12] = [
    ("lunes", Weekday::Mon),
    ("martes", Weekday::Tue),
    ("miércoles", Weekday::Wed),
    ("miercoles", Weekday::Wed),
    ("jueves", Weekday::Thu),
    ("viernes", Weekday::Fri),
    ("sábado", Weekday::Sat),
    ("sabado", Weekday::Sat),
    ("domingo", Weekday::Sun),
    ("monday", Weekday::Mon),
    ("friday", Weekday::Fri),
    ("sunday", Weekday::Sun),
];

/// Lowercase and rewrite "de la mañana" so it is not read as "tomorrow"
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace("de la mañana", "am")
        .replace("de la manana", "am")
}

fn mentions_tomorrow(text: &str) -> bool {
    text.contains("mañana") || text.contains("manana") || text.contains("tomorrow")
}

fn mentions_day_after_tomorrow(text: &str) -> bool {
    text.contains("pasado mañana") || text.contains("pasado manana")
}

/// Next occurrence of `weekday` strictly after `today`
#[must_use]
pub fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let mut ahead = (7 + target - current) % 7;
    if ahead == 0 {
        ahead = 7;
    }
    today + Duration::days(i64::from(ahead))
}

fn named_weekday(text: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .find(|(name, _)| text.contains(name))
        .map(|(_, day)| *day)
}

/// Day named in the text, relative to `today`
fn named_day(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if mentions_day_after_tomorrow(text) {
        return Some(today + Duration::days(2));
    }
    if mentions_tomorrow(text) {
        return Some(today + Duration::days(1));
    }
    if text.contains("hoy") || text.contains("today") {
        return Some(today);
    }
    named_weekday(text).map(|w| next_weekday(today, w))
}

/// Clock time in the text as `(hour, minute)` on a 24h clock
fn clock_time(text: &str) -> Option<(u32, u32)> {
    let caps = CLOCK.captures(text)?;
    let whole = caps.get(0)?.as_str();

    let hour: u32 = caps
        .get(1)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(5))?
        .as_str()
        .parse()
        .ok()?;
    let minute: u32 = caps
        .get(2)
        .or_else(|| caps.get(4))
        .map_or(Some(0), |m| m.as_str().parse().ok())?;

    let pm = whole.contains("pm") || whole.contains("tarde") || whole.contains("noche");
    let am = !pm && whole.contains("am");

    let hour = match (hour, pm, am) {
        (12, false, true) => 0,
        (h, true, _) if h < 12 => h + 12,
        (h, _, _) => h,
    };

    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn at(tz: &FixedOffset, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<FixedOffset>> {
    tz.from_local_datetime(&date.and_hms_opt(hour, minute, 0)?)
        .single()
}

/// Relative offset such as "en 2 horas" or "en media hora"
fn relative_offset(text: &str) -> Option<Duration> {
    let caps = RELATIVE.captures(text)?;
    let amount = caps.get(1)?.as_str();
    let unit = caps.get(2)?.as_str();
    let is_hours = unit.starts_with('h');

    let minutes: i64 = match amount {
        "media" => {
            if is_hours {
                30
            } else {
                return None;
            }
        }
        "un" | "una" => {
            if is_hours {
                60
            } else {
                1
            }
        }
        n => {
            let n: i64 = n.parse().ok()?;
            if is_hours { n.checked_mul(60)? } else { n }
        }
    };
    Duration::try_minutes(minutes)
}

/// Resolve a point in time from free text
///
/// Relative offsets keep `now`'s seconds; clock-time forms land on a whole
/// minute.
#[must_use]
pub fn when(text: &str, now: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    let text = normalize(text);

    if RELATIVE.is_match(&text) {
        return relative_offset(&text).and_then(|offset| now.checked_add_signed(offset));
    }

    let tz = now.offset();
    let today = now.date_naive();
    let clock = clock_time(&text);

    match (named_day(&text, today), clock) {
        (Some(day), Some((h, m))) => at(tz, day, h, m),
        (Some(day), None) if day == today => None,
        (Some(day), None) => at(tz, day, DEFAULT_HOUR, 0),
        (None, Some((h, m))) => {
            let candidate = at(tz, today, h, m)?;
            if candidate > now {
                Some(candidate)
            } else {
                at(tz, today + Duration::days(1), h, m)
            }
        }
        (None, None) => None,
    }
}

/// Remove the time phrases [`when`] understands, keeping the rest as typed
#[must_use]
pub fn strip_when(text: &str) -> String {
    let text = RELATIVE.replace_all(text, " ");
    let text = CLOCK.replace_all(&text, " ");
    let text = DAY_WORDS.replace_all(&text, " ");
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches([',', '.', ';', ':'])
        .trim()
        .to_string()
}

/// Resolve a calendar date from free text
#[must_use]
pub fn due_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = normalize(text);

    if let Some(caps) = ISO_DATE.captures(&text) {
        let y = caps[1].parse().ok()?;
        let m = caps[2].parse().ok()?;
        let d = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d);
    }

    if let Some(caps) = DMY_DATE.captures(&text) {
        let d: u32 = caps[1].parse().ok()?;
        let m: u32 = caps[2].parse().ok()?;
        return match caps.get(3) {
            Some(y) => {
                let mut year: i32 = y.as_str().parse().ok()?;
                if year < 100 {
                    year += 2000;
                }
                NaiveDate::from_ymd_opt(year, m, d)
            }
            None => {
                let this_year = NaiveDate::from_ymd_opt(today.year(), m, d)?;
                if this_year < today {
                    NaiveDate::from_ymd_opt(today.year() + 1, m, d)
                } else {
                    Some(this_year)
                }
            }
        };
    }

    if text.contains("próxima semana")
        || text.contains("proxima semana")
        || text.contains("semana que viene")
    {
        return Some(next_weekday(today, Weekday::Mon));
    }

    named_day(&text, today)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<FixedOffset> {
        // Wednesday
        DateTime::parse_from_rfc3339("2026-03-11T10:15:42-06:00").unwrap()
    }

    fn local(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn relative_hours_are_exact() {
        let t = now();
        assert_eq!(when("recuérdame en 2 horas llamar", t), Some(t + Duration::hours(2)));
        assert_eq!(when("en 45 min", t), Some(t + Duration::minutes(45)));
        assert_eq!(when("en media hora", t), Some(t + Duration::minutes(30)));
        assert_eq!(when("en una hora", t), Some(t + Duration::hours(1)));
    }

    #[test]
    fn huge_offsets_are_rejected() {
        assert_eq!(when("en 99999999999 horas", now()), None);
        assert_eq!(when("en 9223372036854775807 horas", now()), None);
        assert_eq!(when("en 99999999999999 minutos", now()), None);
        assert_eq!(when("en 99999999999999999999 min", now()), None);
    }

    #[test]
    fn time_phrases_are_stripped() {
        assert_eq!(strip_when("sacar la basura mañana a las 8"), "sacar la basura");
        assert_eq!(strip_when("Llamar a Mamá en 2 horas"), "Llamar a Mamá");
        assert_eq!(strip_when("el viernes a las 4 de la tarde, pagar renta"), "pagar renta");
        assert_eq!(strip_when("tomar agua"), "tomar agua");
        assert_eq!(strip_when("en 30 minutos"), "");
    }

    #[test]
    fn tomorrow_defaults_to_nine() {
        assert_eq!(
            when("mañana pagar la luz", now()),
            Some(local("2026-03-12T09:00:00-06:00"))
        );
    }

    #[test]
    fn tomorrow_with_time() {
        assert_eq!(
            when("mañana a las 5 pm", now()),
            Some(local("2026-03-12T17:00:00-06:00"))
        );
        assert_eq!(
            when("mañana a las 7:30", now()),
            Some(local("2026-03-12T07:30:00-06:00"))
        );
    }

    #[test]
    fn morning_phrase_is_not_tomorrow() {
        assert_eq!(
            when("a las 8 de la mañana", now()),
            Some(local("2026-03-12T08:00:00-06:00"))
        );
    }

    #[test]
    fn clock_time_today_or_rolls_over() {
        assert_eq!(
            when("a las 18:00 ir al gym", now()),
            Some(local("2026-03-11T18:00:00-06:00"))
        );
        assert_eq!(
            when("a las 9", now()),
            Some(local("2026-03-12T09:00:00-06:00"))
        );
    }

    #[test]
    fn weekday_is_strictly_after_today() {
        assert_eq!(
            when("el miércoles", now()),
            Some(local("2026-03-18T09:00:00-06:00"))
        );
        assert_eq!(
            when("viernes a las 4 de la tarde", now()),
            Some(local("2026-03-13T16:00:00-06:00"))
        );
    }

    #[test]
    fn no_time_information() {
        assert_eq!(when("comprar leche", now()), None);
        assert_eq!(when("hoy", now()), None);
    }

    #[test]
    fn due_dates() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
        assert_eq!(due_date("para hoy", today), Some(today));
        assert_eq!(due_date("mañana", today), NaiveDate::from_ymd_opt(2026, 3, 12));
        assert_eq!(due_date("pasado mañana", today), NaiveDate::from_ymd_opt(2026, 3, 13));
        assert_eq!(due_date("el lunes", today), NaiveDate::from_ymd_opt(2026, 3, 16));
        assert_eq!(due_date("2026-04-01", today), NaiveDate::from_ymd_opt(2026, 4, 1));
        assert_eq!(due_date("antes del 15/04", today), NaiveDate::from_ymd_opt(2026, 4, 15));
        assert_eq!(due_date("el 01/02", today), NaiveDate::from_ymd_opt(2027, 2, 1));
        assert_eq!(due_date("la próxima semana", today), NaiveDate::from_ymd_opt(2026, 3, 16));
        assert_eq!(due_date("sin fecha", today), None);
    }
}
