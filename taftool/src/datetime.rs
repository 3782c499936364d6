// Copyright 2019 Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parses a user-specified datetime, either in full RFC 3339 format or a
//! shorthand like "in 7 days". Grounded on `tuftool/src/datetime.rs`.

use chrono::{DateTime, TimeDelta, Utc};

pub(crate) fn parse_datetime(input: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.into());
    }

    let mut parts: Vec<&str> = input.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(format!(
            "'{input}': expected RFC 3339, or something like 'in 7 days'"
        ));
    }
    let unit_str = parts.pop().unwrap();
    let count_str = parts.pop().unwrap();
    let prefix_str = parts.pop().unwrap();

    if prefix_str != "in" {
        return Err(format!(
            "'{input}': expected RFC 3339, or prefix 'in', something like 'in 7 days'"
        ));
    }

    let count: i64 = count_str
        .parse()
        .map_err(|e| format!("'{count_str}' is not a valid count: {e}"))?;

    let duration = match unit_str {
        "hour" | "hours" => TimeDelta::try_hours(count),
        "day" | "days" => TimeDelta::try_days(count),
        "week" | "weeks" => TimeDelta::try_weeks(count),
        _ => return Err("date argument's unit must be hours/days/weeks".to_owned()),
    }
    .ok_or_else(|| format!("'{count}' overflows a duration of '{unit_str}'"))?;

    Ok(Utc::now() + duration)
}
