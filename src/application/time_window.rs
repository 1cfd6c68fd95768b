// Time-window filter - keeps the most recent slice of normalized rows
use crate::domain::error::ChartError;
use crate::domain::telemetry::NormalizedRow;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Samples requested from the backend for duration windows
const DURATION_FETCH_LIMIT: usize = 1000;

/// Retention window, relative to the latest sample rather than wall-clock now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeWindow {
    Points(usize),
    Duration(TimeDelta),
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::Points(100)
    }
}

impl TimeWindow {
    /// `limit` query parameter to send with the sample fetch
    pub fn fetch_limit(&self) -> usize {
        match self {
            Self::Points(n) => *n,
            Self::Duration(_) => DURATION_FETCH_LIMIT,
        }
    }

    /// Restrict sorted rows to the window. The result is always a suffix of `rows`.
    pub fn apply<'a>(&self, rows: &'a [NormalizedRow]) -> &'a [NormalizedRow] {
        match self {
            Self::Points(n) => &rows[rows.len().saturating_sub(*n)..],
            Self::Duration(duration) => {
                let Some(latest) = rows.last().map(|r| r.timestamp_ms) else {
                    return rows;
                };
                let cutoff = latest.saturating_sub(duration.num_milliseconds());
                let start = rows.partition_point(|r| r.timestamp_ms < cutoff);
                &rows[start..]
            }
        }
    }
}

impl FromStr for TimeWindow {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || ChartError::UnknownTimeWindow(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(unknown)?;
        let (count, unit) = trimmed.split_at(split);
        let count: i64 = count.parse().map_err(|_| unknown())?;
        if count <= 0 {
            return Err(unknown());
        }

        let window = match unit {
            "points" | "point" => Self::Points(count as usize),
            "hours" | "hour" => Self::Duration(TimeDelta::try_hours(count).ok_or_else(unknown)?),
            "minutes" | "minute" => {
                Self::Duration(TimeDelta::try_minutes(count).ok_or_else(unknown)?)
            }
            _ => return Err(unknown()),
        };
        Ok(window)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Points(n) => write!(f, "{}points", n),
            Self::Duration(d) if d.num_minutes() % 60 == 0 => {
                let hours = d.num_hours();
                write!(f, "{}{}", hours, if hours == 1 { "hour" } else { "hours" })
            }
            Self::Duration(d) => {
                let minutes = d.num_minutes();
                write!(f, "{}{}", minutes, if minutes == 1 { "minute" } else { "minutes" })
            }
        }
    }
}

impl TryFrom<String> for TimeWindow {
    type Error = ChartError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeWindow> for String {
    fn from(window: TimeWindow) -> Self {
        window.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(stamps: &[i64]) -> Vec<NormalizedRow> {
        stamps.iter().map(|&t| NormalizedRow::new(t)).collect()
    }

    fn stamps(rows: &[NormalizedRow]) -> Vec<i64> {
        rows.iter().map(|r| r.timestamp_ms).collect()
    }

    #[test]
    fn test_parse_known_selectors() {
        assert_eq!("100points".parse::<TimeWindow>().unwrap(), TimeWindow::Points(100));
        assert_eq!(
            "1hour".parse::<TimeWindow>().unwrap(),
            TimeWindow::Duration(TimeDelta::hours(1))
        );
        assert_eq!(
            "24hours".parse::<TimeWindow>().unwrap(),
            TimeWindow::Duration(TimeDelta::hours(24))
        );
        assert_eq!(
            "15minutes".parse::<TimeWindow>().unwrap(),
            TimeWindow::Duration(TimeDelta::minutes(15))
        );
        for bad in ["", "hours", "0points", "-1hour", "6days", "1.5hours"] {
            assert!(bad.parse::<TimeWindow>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for s in ["100points", "1hour", "6hours", "24hours", "1minute", "90minutes"] {
            assert_eq!(s.parse::<TimeWindow>().unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_point_window_is_suffix_of_min_len() {
        let data = rows(&[1, 2, 3, 4, 5]);
        for n in 1..8 {
            let out = TimeWindow::Points(n).apply(&data);
            assert_eq!(out.len(), n.min(data.len()));
            assert_eq!(out, &data[data.len() - out.len()..]);
        }
    }

    #[test]
    fn test_duration_window_is_relative_to_latest_sample() {
        let hour = 3_600_000;
        let data = rows(&[0, hour / 2, hour + 10, 2 * hour, 2 * hour + 10]);
        let out = TimeWindow::Duration(TimeDelta::hours(1)).apply(&data);
        assert_eq!(stamps(out), vec![hour + 10, 2 * hour, 2 * hour + 10]);
    }

    #[test]
    fn test_empty_input() {
        assert!(TimeWindow::Points(10).apply(&[]).is_empty());
        assert!(TimeWindow::Duration(TimeDelta::hours(6)).apply(&[]).is_empty());
    }

    #[test]
    fn test_fetch_limit() {
        assert_eq!(TimeWindow::Points(100).fetch_limit(), 100);
        assert_eq!(TimeWindow::Duration(TimeDelta::hours(6)).fetch_limit(), 1000);
    }
}
