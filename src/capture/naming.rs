use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::SystemTime;

/// Project directory names: `yyMMdd_HHmmss`
pub const PROJECT_NAME_FORMAT: &str = "%y%m%d_%H%M%S";

const PROJECT_NAME_LEN: usize = 13;

/// Resolve configured timezone, falling back to UTC on parse errors
pub(crate) fn resolve_timestamp_timezone(tz_name: &str) -> Tz {
    match tz_name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(
                "Invalid timestamp timezone '{}', falling back to UTC",
                tz_name
            );
            chrono_tz::UTC
        }
    }
}

/// Derive a project name from a wall-clock time, at second resolution
pub fn project_name(time: SystemTime, timezone: &Tz) -> String {
    DateTime::<Utc>::from(time)
        .with_timezone(timezone)
        .format(PROJECT_NAME_FORMAT)
        .to_string()
}

/// Check if a directory name matches the project naming pattern
pub fn is_project_name(name: &str) -> bool {
    name.len() == PROJECT_NAME_LEN
        && name.chars().enumerate().all(|(i, c)| match i {
            6 => c == '_',
            _ => c.is_ascii_digit(),
        })
}

/// Recover the creation time encoded in a project name
pub fn parse_project_name(name: &str, timezone: &Tz) -> Option<DateTime<Utc>> {
    if !is_project_name(name) {
        return None;
    }

    let naive = NaiveDateTime::parse_from_str(name, PROJECT_NAME_FORMAT).ok()?;
    timezone
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_project_name_format() {
        // 2024-11-27T09:05:03Z
        let time = UNIX_EPOCH + Duration::from_secs(1_732_698_303);
        assert_eq!(project_name(time, &chrono_tz::UTC), "241127_090503");

        let tokyo = resolve_timestamp_timezone("Asia/Tokyo");
        assert_eq!(project_name(time, &tokyo), "241127_180503");
    }

    #[test]
    fn test_invalid_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timestamp_timezone("Not/AZone"), chrono_tz::UTC);
    }

    #[test]
    fn test_project_name_validation() {
        assert!(is_project_name("241127_090503"));
        assert!(!is_project_name("241127-090503"));
        assert!(!is_project_name("20241127_090503"));
        assert!(!is_project_name("notes"));
    }

    #[test]
    fn test_parse_project_name() {
        let parsed = parse_project_name("241127_090503", &chrono_tz::UTC).unwrap();
        assert_eq!(parsed.year(), 2024);
        assert_eq!(parsed.month(), 11);
        assert_eq!(parsed.day(), 27);
        assert_eq!(parsed.hour(), 9);
        assert_eq!(parsed.second(), 3);

        let tokyo = resolve_timestamp_timezone("Asia/Tokyo");
        let parsed = parse_project_name("241127_180503", &tokyo).unwrap();
        assert_eq!(parsed.hour(), 9);

        assert!(parse_project_name("241399_250000", &chrono_tz::UTC).is_none());
        assert!(parse_project_name("scratch", &chrono_tz::UTC).is_none());
    }
}
