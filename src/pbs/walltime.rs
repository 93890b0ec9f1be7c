// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Walltime / cputime parsing and human-readable formatting.

/// Parse a PBS duration into total seconds.
///
/// Accepted forms: `H:MM:SS` (hours may exceed 24), `D+HH:MM:SS`, or a raw
/// integer number of seconds.
pub fn parse_walltime(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (days, clock) = match text.split_once('+') {
        Some((days, clock)) => (days.trim().parse::<u64>().ok()?, clock),
        None => (0, text),
    };

    let parts: Vec<&str> = clock.split(':').collect();
    let secs = match parts.as_slice() {
        [secs] if days == 0 => secs.parse::<u64>().ok()?,
        [hours, minutes, seconds] => {
            let hours: u64 = hours.parse().ok()?;
            let minutes: u64 = minutes.parse().ok()?;
            let seconds: u64 = seconds.parse().ok()?;
            if minutes >= 60 || seconds >= 60 {
                return None;
            }
            hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)?
        }
        _ => return None,
    };

    days.checked_mul(86_400)?.checked_add(secs)
}

/// Format seconds as `2d 3h 0m 0s`.
///
/// A unit is shown once it or any larger unit is non-zero; seconds are
/// always shown.
pub fn format_duration(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    let mut out = String::new();
    let mut shown = false;
    for (value, unit) in [(days, 'd'), (hours, 'h'), (minutes, 'm')] {
        if shown || value > 0 {
            out.push_str(&format!("{}{} ", value, unit));
            shown = true;
        }
    }
    out.push_str(&format!("{}s", seconds));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_walltime_forms() {
        assert_eq!(parse_walltime("10:30:15"), Some(37815));
        assert_eq!(parse_walltime("2+03:00:00"), Some(183600));
        assert_eq!(parse_walltime("450"), Some(450));
        assert_eq!(parse_walltime("100:00:00"), Some(360_000));
        assert_eq!(parse_walltime(" 0:00:07 "), Some(7));
    }

    #[test]
    fn test_parse_walltime_rejects_malformed() {
        assert_eq!(parse_walltime(""), None);
        assert_eq!(parse_walltime("abc"), None);
        assert_eq!(parse_walltime("10:30"), None);
        assert_eq!(parse_walltime("1:75:00"), None);
        assert_eq!(parse_walltime("2+450"), None);
        assert_eq!(parse_walltime("-5"), None);
    }

    #[test]
    fn test_parse_walltime_overflow_is_rejected() {
        assert_eq!(parse_walltime("9999999999999999999:00:00"), None);
        assert_eq!(parse_walltime("999999999999999+00:00:00"), None);
        assert_eq!(parse_walltime("5124095576030431:00:00"), Some(5_124_095_576_030_431 * 3600));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(450), "7m 30s");
        assert_eq!(format_duration(3600), "1h 0m 0s");
        assert_eq!(format_duration(37815), "10h 30m 15s");
        assert_eq!(format_duration(183600), "2d 3h 0m 0s");
        assert_eq!(format_duration(86_401), "1d 0h 0m 1s");
    }

    #[test]
    fn test_walltime_round_trip_through_format() {
        for (text, secs, rendered) in [
            ("10:30:15", 37815, "10h 30m 15s"),
            ("2+03:00:00", 183600, "2d 3h 0m 0s"),
            ("450", 450, "7m 30s"),
        ] {
            let parsed = parse_walltime(text).unwrap();
            assert_eq!(parsed, secs);
            assert_eq!(format_duration(parsed), rendered);
        }
    }
}
