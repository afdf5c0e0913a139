//! Market sessions and public holidays, evaluated in each market's local time.
//!
//! Timezone rules (including daylight saving) come from `chrono-tz`, so a
//! London session opens at 08:00 London time all year round.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::{America, Europe, Tz};
use serde::{Deserialize, Serialize};

/// A recurring daily trading session. Both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    /// 08:00-17:00 Europe/London.
    London,
    /// 09:00-17:00 America/New_York.
    NewYork,
}

impl Session {
    pub fn timezone(self) -> Tz {
        match self {
            Session::London => Europe::London,
            Session::NewYork => America::New_York,
        }
    }

    /// Local opening and closing hours.
    pub fn hours(self) -> (u32, u32) {
        match self {
            Session::London => (8, 17),
            Session::NewYork => (9, 17),
        }
    }

    pub fn is_open(self, at: DateTime<Utc>) -> bool {
        let local = at.with_timezone(&self.timezone());
        let (open, close) = self.hours();
        let secs = local.num_seconds_from_midnight();
        let (open, close) = (open * 3600, close * 3600);
        secs >= open && (secs < close || (secs == close && local.nanosecond() == 0))
    }
}

/// Public holiday calendar of a market, checked against the local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolidayCalendar {
    /// England and Wales bank holidays.
    Uk,
    /// Major US federal holidays.
    Us,
}

impl HolidayCalendar {
    pub fn timezone(self) -> Tz {
        match self {
            HolidayCalendar::Uk => Europe::London,
            HolidayCalendar::Us => America::New_York,
        }
    }

    pub fn is_holiday(self, at: DateTime<Utc>) -> bool {
        let date = at.with_timezone(&self.timezone()).date_naive();
        match self {
            HolidayCalendar::Uk => is_uk_holiday(date),
            HolidayCalendar::Us => is_us_holiday(date),
        }
    }
}

/// New Year's Day, Independence Day, Veterans Day and Christmas on their
/// calendar dates; MLK, Presidents', Memorial, Labor, Columbus and
/// Thanksgiving days by weekday rule.
pub fn is_us_holiday(date: NaiveDate) -> bool {
    use Weekday::{Mon, Thu};

    let (month, day) = (date.month(), date.day());
    if matches!((month, day), (1, 1) | (7, 4) | (11, 11) | (12, 25)) {
        return true;
    }
    let year = date.year();
    let floating = match month {
        1 => nth_weekday(year, 1, Mon, 3),
        2 => nth_weekday(year, 2, Mon, 3),
        5 => last_weekday(year, 5, Mon),
        9 => nth_weekday(year, 9, Mon, 1),
        10 => nth_weekday(year, 10, Mon, 2),
        11 => nth_weekday(year, 11, Thu, 4),
        _ => None,
    };
    floating == Some(date)
}

/// England and Wales bank holidays. Weekend New Year, Christmas and Boxing
/// days move to the following weekdays; the calendar dates also count.
pub fn is_uk_holiday(date: NaiveDate) -> bool {
    use Weekday::Mon;

    let year = date.year();
    let (month, day) = (date.month(), date.day());
    if matches!((month, day), (1, 1) | (12, 25) | (12, 26)) {
        return true;
    }

    let mut holidays = Vec::with_capacity(8);
    if let Some(new_year) = NaiveDate::from_ymd_opt(year, 1, 1) {
        holidays.push(next_weekday(new_year));
    }
    if let Some(easter) = easter_sunday(year) {
        holidays.push(easter - Duration::days(2));
        holidays.push(easter + Duration::days(1));
    }
    holidays.extend(nth_weekday(year, 5, Mon, 1));
    holidays.extend(last_weekday(year, 5, Mon));
    holidays.extend(last_weekday(year, 8, Mon));
    if let Some(christmas) = NaiveDate::from_ymd_opt(year, 12, 25) {
        let christmas = next_weekday(christmas);
        let boxing = next_weekday(christmas + Duration::days(1));
        holidays.push(christmas);
        holidays.push(boxing);
    }
    holidays.contains(&date)
}

/// Easter Sunday by the anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u8) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, weekday, n)
}

fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    nth_weekday(year, month, weekday, 5).or_else(|| nth_weekday(year, month, weekday, 4))
}

/// `date`, or the Monday after it when it falls on a weekend.
fn next_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}
