use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, TimeZone, Timelike};

/// Date format used by Tempo for `startDate`, `from` and `to`.
pub const API_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_api_date(date: NaiveDate) -> String {
    date.format(API_DATE_FORMAT).to_string()
}

/// Start of the reported period for the time tracker: one second after local midnight.
pub fn period_since(date: NaiveDate) -> Result<DateTime<Local>> {
    Ok(local_midnight(date)? + Duration::seconds(1))
}

/// End of the reported period for the time tracker: the last second of the day.
pub fn period_until(date: NaiveDate) -> Result<DateTime<Local>> {
    Ok(local_midnight(date)? + Duration::days(1) - Duration::seconds(1))
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Local>> {
    Local
        .from_local_datetime(&date.and_time(NaiveTime::MIN))
        .earliest()
        .ok_or_else(|| anyhow!("Local midnight doesn't exist for {date}"))
}

/// Drops seconds and sub-seconds. Worklogs are compared with minute precision.
pub fn truncate_to_minute<T: Timelike>(value: T) -> T {
    value
        .with_second(0)
        .and_then(|v| v.with_nanosecond(0))
        .expect("Zero seconds and nanoseconds are always valid")
}

/// Returns the first day of the week containing `today`. `first_day_of_week` follows the
/// 1 = Monday ... 7 = Sunday convention.
pub fn beginning_of_week(today: NaiveDate, first_day_of_week: u8) -> NaiveDate {
    let today_number = today.weekday().number_from_monday() as i64;
    let offset = (today_number - first_day_of_week as i64).rem_euclid(7);
    today - Duration::days(offset)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, Timelike};

    use super::{beginning_of_week, format_api_date, truncate_to_minute};

    #[test]
    fn beginning_of_week_respects_first_day() {
        // 2020-10-29 is a Thursday.
        let thursday = NaiveDate::from_ymd_opt(2020, 10, 29).unwrap();

        assert_eq!(
            beginning_of_week(thursday, 1),
            NaiveDate::from_ymd_opt(2020, 10, 26).unwrap()
        );
        assert_eq!(
            beginning_of_week(thursday, 7),
            NaiveDate::from_ymd_opt(2020, 10, 25).unwrap()
        );
        assert_eq!(beginning_of_week(thursday, 4), thursday);
        assert_eq!(
            beginning_of_week(thursday, 5),
            NaiveDate::from_ymd_opt(2020, 10, 23).unwrap()
        );
    }

    #[test]
    fn truncate_drops_seconds() {
        let value =
            NaiveDateTime::parse_from_str("2020-10-29 17:15:42.5", "%Y-%m-%d %H:%M:%S%.f").unwrap();

        let truncated = truncate_to_minute(value);

        assert_eq!(truncated.minute(), 15);
        assert_eq!(truncated.second(), 0);
        assert_eq!(truncated.nanosecond(), 0);
    }

    #[test]
    fn api_date_format() {
        assert_eq!(
            format_api_date(NaiveDate::from_ymd_opt(2016, 12, 3).unwrap()),
            "2016-12-03"
        );
    }
}
