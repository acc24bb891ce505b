// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Display dates for the dialog engine: Dutch names, Europe/Brussels time

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Europe::Brussels;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Label used instead of the weekday when the date is today
pub const TODAY: &str = "vandaag";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedDate {
    /// `DD/MM/YYYY`
    #[serde(rename = "fullDate")]
    pub full_date: String,
    /// `HH:mm`
    pub time: String,
    pub day: String,
}

/// Format `at` in Brussels local time; `now` decides the "today" label.
pub fn format_date(at: DateTime<Utc>, now: DateTime<Utc>) -> FormattedDate {
    let local = to_brussels(at);
    let full_date = local.format("%d/%m/%Y").to_string();
    let today = to_brussels(now).format("%d/%m/%Y").to_string();

    let day = if full_date == today {
        TODAY.to_string()
    } else {
        dutch_weekday(local.weekday()).to_string()
    };

    FormattedDate {
        full_date,
        time: local.format("%H:%M").to_string(),
        day,
    }
}

/// Accepts RFC 3339 strings, zone-less ISO strings (read as UTC) and epoch
/// milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            }),
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Wall-clock time in Brussels
pub fn to_brussels(at: DateTime<Utc>) -> DateTime<Tz> {
    at.with_timezone(&Brussels)
}

fn dutch_weekday(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "maandag",
        Weekday::Tue => "dinsdag",
        Weekday::Wed => "woensdag",
        Weekday::Thu => "donderdag",
        Weekday::Fri => "vrijdag",
        Weekday::Sat => "zaterdag",
        Weekday::Sun => "zondag",
    }
}
