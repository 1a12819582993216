// Human-readable labels for counts, ISO-8601 durations, and playback clocks.

pub fn view_count(raw: Option<u64>) -> String {
    let count = raw.unwrap_or(0);
    if count >= 1_000_000 {
        format!("{:.1}M views", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K views", count as f64 / 1_000.0)
    } else {
        format!("{} views", count)
    }
}

/// Renders an ISO-8601 duration like "PT1H2M3S" as "1:02:03" ("5:09" when
/// there is no hour component). Anything unparseable becomes an empty string.
pub fn duration(iso: &str) -> String {
    let Some(rest) = iso.strip_prefix("PT") else {
        return String::new();
    };

    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0u64;
    let mut current = String::new();

    for c in rest.chars() {
        match c {
            '0'..='9' => current.push(c),
            'H' => {
                hours = current.parse().unwrap_or(0);
                current.clear();
            }
            'M' => {
                minutes = current.parse().unwrap_or(0);
                current.clear();
            }
            'S' => {
                seconds = current.parse().unwrap_or(0);
                current.clear();
            }
            _ => {}
        }
    }

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Playback clock label for the seek bar, e.g. 62.4 -> "1:02".
pub fn timestamp(seconds: f64) -> String {
    if !seconds.is_finite() || seconds <= 0.0 {
        return "0:00".to_string();
    }

    let total = seconds as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_count_absent_or_zero() {
        assert_eq!(view_count(None), "0 views");
        assert_eq!(view_count(Some(0)), "0 views");
    }

    #[test]
    fn view_count_magnitudes() {
        assert_eq!(view_count(Some(999)), "999 views");
        assert_eq!(view_count(Some(1_500)), "1.5K views");
        assert_eq!(view_count(Some(2_300_000)), "2.3M views");
    }

    #[test]
    fn view_count_always_ends_in_views() {
        for n in [0, 1, 999, 1_000, 999_999, 1_000_000, 40_000_000_000] {
            assert!(view_count(Some(n)).ends_with(" views"));
        }
    }

    #[test]
    fn duration_with_hours() {
        assert_eq!(duration("PT1H2M3S"), "1:02:03");
        assert_eq!(duration("PT10H0M59S"), "10:00:59");
    }

    #[test]
    fn duration_without_hours() {
        assert_eq!(duration("PT5M9S"), "5:09");
        assert_eq!(duration("PT45S"), "0:45");
        assert_eq!(duration("PT3M"), "3:00");
    }

    #[test]
    fn duration_unparseable_is_empty() {
        assert_eq!(duration(""), "");
        assert_eq!(duration("P1D"), "");
        assert_eq!(duration("4:13"), "");
    }

    #[test]
    fn timestamp_clock_forms() {
        assert_eq!(timestamp(0.0), "0:00");
        assert_eq!(timestamp(f64::NAN), "0:00");
        assert_eq!(timestamp(62.4), "1:02");
        assert_eq!(timestamp(3723.0), "1:02:03");
    }
}
