use serde::Serialize;
use serde_json::{Map, Value};

use super::{COMPANIONSHIPS, DISTRICTS, HISTORY, MEMBERS};
use crate::domain::companionship::{Companionship, Family};
use crate::domain::district::MinisteringDistrict;
use crate::domain::history::MinisteringHistory;
use crate::domain::member::Member;
use crate::store::{
    encode, server_timestamp, Direction, Document, DocumentStore, Filter, Query, StoreError,
};

fn encode_without_id<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    let mut data = encode(value)?;
    if let Value::Object(fields) = &mut data {
        fields.remove("id");
    }
    Ok(data)
}

fn stamp(data: &mut Value, created_at: Option<&str>) {
    if let Value::Object(fields) = data {
        let created = match created_at {
            Some(existing) => Value::String(existing.to_string()),
            None => server_timestamp(),
        };
        fields.insert("createdAt".to_string(), created);
        fields.insert("updatedAt".to_string(), server_timestamp());
    }
}

pub fn decode_companionship(document: &Document) -> Result<Companionship, StoreError> {
    let mut companionship: Companionship = document.decode(COMPANIONSHIPS)?;
    companionship.id = document.id.clone();
    Ok(companionship)
}

pub fn load_companionships(store: &dyn DocumentStore) -> Result<Vec<Companionship>, StoreError> {
    store
        .query(
            COMPANIONSHIPS,
            &Query::all().order_by("createdAt", Direction::Ascending),
        )?
        .iter()
        .map(decode_companionship)
        .collect()
}

pub fn get_companionship(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<Option<Companionship>, StoreError> {
    store
        .get(COMPANIONSHIPS, id)?
        .as_ref()
        .map(decode_companionship)
        .transpose()
}

pub fn require_companionship(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<Companionship, StoreError> {
    get_companionship(store, id)?.ok_or_else(|| StoreError::NotFound {
        collection: COMPANIONSHIPS.to_string(),
        id: id.to_string(),
    })
}

pub fn companionship_data(companionship: &Companionship) -> Result<Value, StoreError> {
    let mut data = encode_without_id(companionship)?;
    stamp(&mut data, companionship.created_at.as_deref());
    Ok(data)
}

/// Patch that rewrites only the family list.
pub fn families_patch(families: &[Family]) -> Result<Map<String, Value>, StoreError> {
    let mut patch = Map::new();
    patch.insert("families".to_string(), serde_json::to_value(families)?);
    patch.insert("updatedAt".to_string(), server_timestamp());
    Ok(patch)
}

pub fn decode_district(document: &Document) -> Result<MinisteringDistrict, StoreError> {
    let mut district: MinisteringDistrict = document.decode(DISTRICTS)?;
    district.id = document.id.clone();
    Ok(district)
}

pub fn load_districts(store: &dyn DocumentStore) -> Result<Vec<MinisteringDistrict>, StoreError> {
    store
        .query(DISTRICTS, &Query::all())?
        .iter()
        .map(decode_district)
        .collect()
}

pub fn require_district(
    store: &dyn DocumentStore,
    id: &str,
) -> Result<MinisteringDistrict, StoreError> {
    store
        .get(DISTRICTS, id)?
        .as_ref()
        .map(decode_district)
        .transpose()?
        .ok_or_else(|| StoreError::NotFound {
            collection: DISTRICTS.to_string(),
            id: id.to_string(),
        })
}

pub fn district_data(district: &MinisteringDistrict) -> Result<Value, StoreError> {
    let mut data = encode_without_id(district)?;
    if let Value::Object(fields) = &mut data {
        if district.created_at.is_none() {
            fields.insert("createdAt".to_string(), server_timestamp());
        }
    }
    Ok(data)
}

pub fn decode_member(document: &Document) -> Result<Member, StoreError> {
    let mut member: Member = document.decode(MEMBERS)?;
    member.id = document.id.clone();
    Ok(member)
}

pub fn load_members(store: &dyn DocumentStore) -> Result<Vec<Member>, StoreError> {
    store
        .query(
            MEMBERS,
            &Query::all().order_by("lastName", Direction::Ascending),
        )?
        .iter()
        .map(decode_member)
        .collect()
}

/// Members whose `ministeringTeachers` lists `companion`.
pub fn members_taught_by(
    store: &dyn DocumentStore,
    companion: &str,
) -> Result<Vec<Member>, StoreError> {
    store
        .query(
            MEMBERS,
            &Query::all()
                .filter(Filter::array_contains("ministeringTeachers", companion))
                .order_by("lastName", Direction::Ascending),
        )?
        .iter()
        .map(decode_member)
        .collect()
}

pub fn get_member(store: &dyn DocumentStore, id: &str) -> Result<Option<Member>, StoreError> {
    store
        .get(MEMBERS, id)?
        .as_ref()
        .map(decode_member)
        .transpose()
}

pub fn member_data(member: &Member) -> Result<Value, StoreError> {
    let mut data = encode_without_id(member)?;
    stamp(&mut data, None);
    Ok(data)
}

pub fn teachers_patch(teachers: &[String]) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert(
        "ministeringTeachers".to_string(),
        Value::Array(teachers.iter().cloned().map(Value::String).collect()),
    );
    patch.insert("updatedAt".to_string(), server_timestamp());
    patch
}

pub fn decode_history(document: &Document) -> Result<MinisteringHistory, StoreError> {
    let mut entry: MinisteringHistory = document.decode(HISTORY)?;
    entry.id = document.id.clone();
    Ok(entry)
}

/// Newest month first.
pub fn load_history(store: &dyn DocumentStore) -> Result<Vec<MinisteringHistory>, StoreError> {
    let mut entries = store
        .query(HISTORY, &Query::all())?
        .iter()
        .map(decode_history)
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by(|left, right| right.id.cmp(&left.id));
    Ok(entries)
}

pub fn get_history(
    store: &dyn DocumentStore,
    month_key: &str,
) -> Result<Option<MinisteringHistory>, StoreError> {
    store
        .get(HISTORY, month_key)?
        .as_ref()
        .map(decode_history)
        .transpose()
}

pub fn history_data(entry: &MinisteringHistory) -> Result<Value, StoreError> {
    let mut data = encode_without_id(entry)?;
    if let Value::Object(fields) = &mut data {
        fields.insert("createdAt".to_string(), server_timestamp());
    }
    Ok(data)
}
