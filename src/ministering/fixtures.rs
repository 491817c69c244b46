use serde_json::json;

use super::{repo, COMPANIONSHIPS, DISTRICTS, MEMBERS};
use crate::domain::companionship::{Companionship, Family};
use crate::domain::district::MinisteringDistrict;
use crate::domain::member::{Member, MemberStatus};
use crate::store::sqlite::SqliteStore;
use crate::store::{DocumentStore, SetOptions};

pub fn store() -> SqliteStore {
    SqliteStore::open_in_memory().expect("memory store should open")
}

pub fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn family(name: &str, member_id: Option<&str>, visited: bool) -> Family {
    Family {
        visited_this_month: visited,
        ..Family::new(name, member_id)
    }
}

pub fn companionship(id: &str, companions: &[&str], families: Vec<Family>) -> Companionship {
    Companionship {
        id: id.to_string(),
        companions: names(companions),
        families,
        created_at: None,
        updated_at: None,
    }
}

pub fn seed_companionship(store: &dyn DocumentStore, companionship: &Companionship) {
    let data = repo::companionship_data(companionship).expect("companionship should encode");
    store
        .set(
            COMPANIONSHIPS,
            &companionship.id,
            &data,
            SetOptions::overwrite(),
        )
        .expect("companionship seed should succeed");
}

pub fn seed_member(store: &dyn DocumentStore, id: &str, last_name: &str, teachers: &[&str]) {
    store
        .set(
            MEMBERS,
            id,
            &json!({
                "firstName": "Hermano",
                "lastName": last_name,
                "status": MemberStatus::Active.as_str(),
                "ministeringTeachers": teachers,
            }),
            SetOptions::overwrite(),
        )
        .expect("member seed should succeed");
}

pub fn seed_district(store: &dyn DocumentStore, id: &str, name: &str, companionship_ids: &[&str]) {
    let district = MinisteringDistrict {
        id: id.to_string(),
        name: name.to_string(),
        companionship_ids: names(companionship_ids),
        leader_id: None,
        leader_name: None,
        created_at: None,
    };
    let data = repo::district_data(&district).expect("district should encode");
    store
        .set(DISTRICTS, id, &data, SetOptions::overwrite())
        .expect("district seed should succeed");
}

pub fn member(store: &dyn DocumentStore, id: &str) -> Member {
    repo::get_member(store, id)
        .expect("member read should succeed")
        .expect("member should exist")
}

pub fn teachers(store: &dyn DocumentStore, id: &str) -> Vec<String> {
    member(store, id).ministering_teachers
}
