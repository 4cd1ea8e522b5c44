//! Entity normalization: raw wire records to canonical entity fields.
//!
//! Normalization never fails: missing or malformed fields degrade to
//! defaults. Side-table registrations (city, university) are returned as
//! data for the caller to apply to the store; deactivated records are the
//! caller's job to drop before calling in here.

use chrono::{DateTime, Utc};

use crate::api::{CityId, GroupId, RawGroup, RawProfile, UniversityId, UserId};
use crate::store::{GroupRecord, UserRecord};

/// A normalized user plus the side-table entries its record referenced.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUser {
    pub id: UserId,
    pub record: UserRecord,
    pub city: Option<(CityId, String)>,
    pub university: Option<(UniversityId, String)>,
}

/// Normalize one raw profile record.
///
/// `reference_year` anchors the age computation: age is the reference
/// year minus the birth year from a `day.month.year` date string. An
/// absent, partial ("month.year") or unparseable date leaves age unset.
pub fn parse_user(entry: &RawProfile, reference_year: i32) -> ParsedUser {
    let name = format!("{} {}", entry.first_name, entry.last_name)
        .trim()
        .to_string();

    let age = entry
        .bdate
        .as_deref()
        .and_then(|bdate| birth_year(bdate))
        .map(|year| reference_year - year);

    let university = entry
        .universities
        .as_deref()
        .and_then(|list| list.first())
        .map(|u| (u.id, u.name.trim().to_string()));

    let city = entry
        .city
        .as_ref()
        .map(|c| (c.id, c.title.trim().to_string()));

    let last_seen = entry
        .last_seen
        .as_ref()
        .and_then(|seen| DateTime::from_timestamp(seen.time, 0))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    ParsedUser {
        id: entry.id,
        record: UserRecord {
            name,
            age,
            city_id: city.as_ref().map(|(id, _)| *id),
            university_id: university.as_ref().map(|(id, _)| *id),
            last_seen,
        },
        city,
        university,
    }
}

/// Birth year from a `day.month.year` string; the year is only present
/// when all three components are.
fn birth_year(bdate: &str) -> Option<i32> {
    let parts: Vec<&str> = bdate.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    parts[2].parse().ok()
}

/// Normalize one raw group record.
pub fn parse_group(entry: &RawGroup) -> (GroupId, GroupRecord) {
    (
        entry.id,
        GroupRecord {
            name: entry.name.trim().to_string(),
        },
    )
}
