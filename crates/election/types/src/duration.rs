//! Compact duration codec
//!
//! Election lengths are written as concatenated `<integer><unit>` tokens
//! such as `2d6h30m`. Countdowns are rendered back in the same units,
//! dropping seconds once a quantity reaches a day.

use chrono::Duration;
use regex::Regex;
use std::sync::OnceLock;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 3_600;
const SECONDS_PER_DAY: i64 = 86_400;

fn token_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"([0-9]+)([dhms])").ok())
        .as_ref()
}

/// Parse a compact duration string such as `1d2h30m` or `45m`.
///
/// Units are `d`, `h`, `m`, `s` (case-insensitive) and whitespace is
/// ignored. Unrecognised fragments are skipped and repeated units
/// accumulate, so `1h1h` is two hours. Returns `None` when no token
/// matched or the total does not fit in a duration.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    let mut matches = 0usize;
    for caps in token_pattern()?.captures_iter(&normalized) {
        matches += 1;
        let value: i64 = caps[1].parse().ok()?;
        let unit = match &caps[2] {
            "d" => SECONDS_PER_DAY,
            "h" => SECONDS_PER_HOUR,
            "m" => SECONDS_PER_MINUTE,
            _ => 1,
        };
        total = total.checked_add(value.checked_mul(unit)?)?;
    }

    if matches == 0 {
        return None;
    }
    Duration::try_seconds(total)
}

/// Render a duration as `1d 2h 30m`, `45m 10s` or `0s`.
///
/// Seconds are only shown for durations shorter than a day.
pub fn format_duration(duration: Duration) -> String {
    let mut seconds = duration.num_seconds();
    if seconds <= 0 {
        return "0s".to_string();
    }

    let days = seconds / SECONDS_PER_DAY;
    seconds %= SECONDS_PER_DAY;
    let hours = seconds / SECONDS_PER_HOUR;
    seconds %= SECONDS_PER_HOUR;
    let minutes = seconds / SECONDS_PER_MINUTE;
    seconds %= SECONDS_PER_MINUTE;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 && days == 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_compound() {
        assert_eq!(
            parse_duration("2d6h30m"),
            Some(Duration::days(2) + Duration::hours(6) + Duration::minutes(30))
        );
        assert_eq!(parse_duration("45m"), Some(Duration::minutes(45)));
        assert_eq!(parse_duration("90s"), Some(Duration::seconds(90)));
    }

    #[test]
    fn test_parse_is_lenient() {
        assert_eq!(parse_duration("1H 30M"), Some(Duration::minutes(90)));
        assert_eq!(parse_duration("1h1h"), Some(Duration::hours(2)));
        assert_eq!(parse_duration("x1hy"), Some(Duration::hours(1)));
        assert_eq!(parse_duration("0s"), Some(Duration::zero()));
        assert_eq!(parse_duration("\u{0661}h30m"), Some(Duration::minutes(30)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("   "), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("12"), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_duration(Duration::zero()), "0s");
        assert_eq!(format_duration(Duration::seconds(-5)), "0s");
        assert_eq!(format_duration(Duration::seconds(45)), "45s");
        assert_eq!(format_duration(Duration::seconds(3_725)), "1h 2m 5s");
        assert_eq!(
            format_duration(Duration::days(2) + Duration::hours(6)),
            "2d 6h"
        );
    }

    #[test]
    fn test_format_drops_seconds_at_day_scale() {
        // 1d 1h 1s: the trailing second is not displayed
        let formatted = format_duration(Duration::seconds(90_061));
        assert_eq!(formatted, "1d 1h");
        assert_eq!(parse_duration(&formatted), Some(Duration::seconds(90_000)));

        assert_eq!(format_duration(Duration::seconds(86_401)), "1d");
    }

    proptest! {
        #[test]
        fn sub_day_durations_survive_format_then_parse(secs in 1i64..SECONDS_PER_DAY) {
            let duration = Duration::seconds(secs);
            let formatted = format_duration(duration);
            prop_assert!(!formatted.ends_with(' '));
            prop_assert_eq!(parse_duration(&formatted), Some(duration));
        }

        #[test]
        fn whole_minute_durations_survive_format_then_parse(minutes in 1i64..(400 * 1_440)) {
            let duration = Duration::minutes(minutes);
            prop_assert_eq!(parse_duration(&format_duration(duration)), Some(duration));
        }
    }
}
