use std::time::SystemTime;
use chrono::{
    DateTime, Duration, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat, SubsecRound,
    TimeZone, Utc,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// `YYYY-MM-DD` then `_`, `T` or `-`, then `HH`, `MM`, `SS` separated by `-`, `_` or `:`
static CLIP_TIMESTAMP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([0-9]{4})-([0-9]{2})-([0-9]{2})[_T-]([0-9]{2})[-_:]([0-9]{2})[-_:]([0-9]{2})")
        .expect("clip timestamp pattern is valid")
});

/// Resolve the capture instant of a clip.
///
/// The recorder embeds a local wall-clock time in most file names
/// (`2024-03-11_14-22-05-front.mp4`). When the name carries a complete
/// date-time it wins; otherwise `fallback` (the file's mtime) is used.
/// Both branches are truncated to millisecond precision so they compare
/// equal to their ISO-8601 rendering.
pub fn resolve_timestamp(file_name: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    resolve_timestamp_in(&Local, file_name, fallback)
}

/// [`resolve_timestamp`] with the wall clock read in `tz`
pub fn resolve_timestamp_in<Tz: TimeZone>(tz: &Tz, file_name: &str, fallback: DateTime<Utc>) -> DateTime<Utc> {
    parse_clip_timestamp_in(tz, file_name)
        .unwrap_or(fallback)
        .trunc_subsecs(3)
}

/// Extract the embedded date-time from a clip name, interpreted in local time
pub fn parse_clip_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    parse_clip_timestamp_in(&Local, file_name)
}

/// Extract the embedded date-time from a clip name, interpreted in `tz`.
///
/// The first candidate with a real calendar date and clock time wins, so a
/// garbage run of digits earlier in the name does not hide a valid stamp.
pub fn parse_clip_timestamp_in<Tz: TimeZone>(tz: &Tz, file_name: &str) -> Option<DateTime<Utc>> {
    CLIP_TIMESTAMP
        .captures_iter(file_name)
        .find_map(|caps| {
            let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
            let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
            let date = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)?;
            let time = NaiveTime::from_hms_opt(field(4)?, field(5)?, field(6)?)?;
            Some(NaiveDateTime::new(date, time))
        })
        .and_then(|naive| local_to_utc(tz, naive))
}

/// Longest wall-clock jump looked past when a time falls in a DST gap
const DST_GAP_LOOKBACK_HOURS: i64 = 3;

/// Map a wall-clock time in `tz` to an instant.
///
/// Repeated times (clocks turned back) take the earlier instant. Skipped
/// times (clocks turned forward) keep the offset in force before the jump,
/// so `02:30` on a spring-forward night reads as `03:30` after it.
fn local_to_utc<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => {
            let before = tz
                .from_local_datetime(&(naive - Duration::hours(DST_GAP_LOOKBACK_HOURS)))
                .earliest()?;
            let offset = i64::from(before.offset().fix().local_minus_utc());
            Some(Utc.from_utc_datetime(&(naive - Duration::seconds(offset))))
        }
    }
}

/// Convert a filesystem time into the UTC instant used for clip records
pub fn system_time_to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// ISO-8601 rendering with millisecond precision and a `Z` suffix
pub fn format_iso(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// serde helper that writes timestamps through [`format_iso`]
pub mod iso_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_iso(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
