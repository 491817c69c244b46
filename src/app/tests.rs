use time::macros::datetime;
use time::Duration;

use super::{
    App, AppError, CompanionshipPatch, DistrictChange, FamilyInput, NewCompanionship, SaveOutcome,
};
use crate::config::QuorumConfig;
use crate::domain::companionship::Companionship;
use crate::domain::member::MemberStatus;
use crate::ministering::fixtures::{names, seed_member, teachers};
use crate::ministering::rollover::{RolloverOutcome, LAST_RESET_KEY};
use crate::ministering::validator::AssignmentIssue;
use crate::store::MarkerStore;
use uuid::Uuid;

fn app() -> App {
    App::open_in_memory(QuorumConfig::default()).expect("app should open")
}

fn new_companionship(companions: &[&str], families: Vec<FamilyInput>) -> NewCompanionship {
    NewCompanionship {
        companions: names(companions),
        families,
        district: None,
    }
}

fn saved(outcome: SaveOutcome) -> Companionship {
    match outcome {
        SaveOutcome::Saved {
            companionship,
            sync,
            placement_error,
        } => {
            assert!(sync.is_clean(), "unexpected sync failures: {:?}", sync);
            assert!(placement_error.is_none(), "placement failed: {:?}", placement_error);
            companionship
        }
        SaveOutcome::Rejected(issue) => panic!("save was rejected: {}", issue),
    }
}

fn patch() -> CompanionshipPatch {
    CompanionshipPatch {
        companions: None,
        add_families: Vec::new(),
        remove_families: Vec::new(),
        district: DistrictChange::Keep,
    }
}

#[test]
fn open_creates_parent_directories() {
    let root = std::env::temp_dir().join(format!("quorum-app-test-{}", Uuid::now_v7()));
    let db_path = root.join(".quorum/state.sqlite");
    let app = App::open(
        db_path.to_str().expect("utf8 path"),
        QuorumConfig::default(),
    )
    .expect("app should open");
    assert!(db_path.exists());
    assert!(app.list_members().expect("list should succeed").is_empty());
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn members_are_added_and_listed_by_last_name() {
    let app = app();
    let soto = app
        .add_member(" Elena ", "Soto", MemberStatus::Active)
        .expect("member should be added");
    app.add_member("Raúl", "Pérez", MemberStatus::LessActive)
        .expect("member should be added");

    assert_eq!(soto.first_name, "Elena");
    let listed = app.list_members().expect("list should succeed");
    let last_names = listed
        .iter()
        .map(|member| member.last_name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(last_names, vec!["Pérez", "Soto"]);

    let shown = app
        .show_member(&soto.id)
        .expect("show should succeed")
        .expect("member should exist");
    assert_eq!(shown.status, MemberStatus::Active);

    let blank = app.add_member("  ", "Soto", MemberStatus::Active);
    assert!(matches!(blank, Err(AppError::InvalidArgument(_))));
}

#[test]
fn members_taught_by_follows_reverse_sync() {
    let app = app();
    seed_member(app.store(), "m1", "Pérez", &[]);
    seed_member(app.store(), "m2", "Lima", &[]);
    saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![
                FamilyInput::Member("m1".to_string()),
                FamilyInput::Member("m2".to_string()),
            ],
        ))
        .expect("create should succeed"),
    );

    let taught = app.members_taught_by(" Ana ").expect("query should succeed");
    let ids = taught.iter().map(|member| member.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["m2", "m1"]);
    assert!(app
        .members_taught_by("Pedro")
        .expect("query should succeed")
        .is_empty());
    assert!(matches!(
        app.members_taught_by(""),
        Err(AppError::InvalidArgument(_))
    ));
}

#[test]
fn create_syncs_teachers_and_places_district() {
    let app = app();
    let page = app
        .load_ministering_page(datetime!(2026-03-01 10:00 UTC))
        .expect("page should load");
    let district_id = page.districts[1].id.clone();
    seed_member(app.store(), "m1", "Pérez", &["Marta"]);

    let companionship = saved(
        app.create_companionship(NewCompanionship {
            companions: names(&["Ana", "Luis"]),
            families: vec![
                FamilyInput::Member("m1".to_string()),
                FamilyInput::Manual("Familia Lima".to_string()),
            ],
            district: Some(district_id.clone()),
        })
        .expect("create should succeed"),
    );

    assert_eq!(companionship.families.len(), 2);
    assert_eq!(companionship.families[0].name, "Familia Pérez");
    assert_eq!(companionship.families[0].member_id.as_deref(), Some("m1"));
    assert!(companionship.created_at.is_some());
    assert_eq!(
        teachers(app.store(), "m1"),
        names(&["Marta", "Ana", "Luis"])
    );

    let district = app
        .district_of(&companionship.id)
        .expect("lookup should succeed")
        .expect("companionship should be placed");
    assert_eq!(district.id, district_id);
}

#[test]
fn conflicting_create_is_rejected_without_writes() {
    let app = app();
    seed_member(app.store(), "m1", "Pérez", &[]);
    saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Member("m1".to_string())],
        ))
        .expect("create should succeed"),
    );

    let outcome = app
        .create_companionship(new_companionship(
            &["Pedro", "Sofía"],
            vec![FamilyInput::Member("m1".to_string())],
        ))
        .expect("validation should run");
    assert!(matches!(
        outcome,
        SaveOutcome::Rejected(AssignmentIssue::FamilyAlreadyAssigned { .. })
    ));
    assert_eq!(app.list_companionships().expect("list").len(), 1);
    assert_eq!(teachers(app.store(), "m1"), names(&["Ana", "Luis"]));

    let double_booked = app
        .create_companionship(new_companionship(&["Luis", "Pedro"], Vec::new()))
        .expect("validation should run");
    assert!(matches!(
        double_booked,
        SaveOutcome::Rejected(AssignmentIssue::CompanionAlreadyAssigned { .. })
    ));
}

#[test]
fn deceased_members_and_unknown_ids_cannot_be_families() {
    let app = app();
    let deceased = app
        .add_member("José", "Mora", MemberStatus::Deceased)
        .expect("member should be added");

    let result = app.create_companionship(new_companionship(
        &["Ana", "Luis"],
        vec![FamilyInput::Member(deceased.id)],
    ));
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));

    let missing = app.create_companionship(new_companionship(
        &["Ana", "Luis"],
        vec![FamilyInput::Member("m404".to_string())],
    ));
    assert!(matches!(
        missing,
        Err(AppError::NotFound { kind: "member", .. })
    ));
}

#[test]
fn update_swaps_companions_and_families() {
    let app = app();
    seed_member(app.store(), "m1", "Pérez", &[]);
    seed_member(app.store(), "m2", "Soto", &[]);
    let created = saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Member("m1".to_string())],
        ))
        .expect("create should succeed"),
    );
    app.set_family_visited(&created.id, "Familia Pérez", true)
        .expect("visit should succeed");

    let updated = saved(
        app.update_companionship(
            &created.id,
            CompanionshipPatch {
                companions: Some(names(&["Ana", "Jorge"])),
                add_families: vec![FamilyInput::Member("m2".to_string())],
                ..patch()
            },
        )
        .expect("update should succeed"),
    );
    assert_eq!(updated.companions, names(&["Ana", "Jorge"]));
    assert!(updated.families[0].visited_this_month);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(teachers(app.store(), "m1"), names(&["Ana", "Jorge"]));
    assert_eq!(teachers(app.store(), "m2"), names(&["Ana", "Jorge"]));

    saved(
        app.update_companionship(
            &created.id,
            CompanionshipPatch {
                remove_families: vec!["Familia Pérez".to_string()],
                ..patch()
            },
        )
        .expect("update should succeed"),
    );
    assert!(teachers(app.store(), "m1").is_empty());
    assert_eq!(teachers(app.store(), "m2"), names(&["Ana", "Jorge"]));

    let empty = app.update_companionship(&created.id, patch());
    assert!(matches!(empty, Err(AppError::InvalidArgument(_))));

    let missing = app.update_companionship(
        "nope",
        CompanionshipPatch {
            companions: Some(names(&["Ana", "Jorge"])),
            ..patch()
        },
    );
    assert!(matches!(
        missing,
        Err(AppError::NotFound {
            kind: "companionship",
            ..
        })
    ));
}

#[test]
fn removing_an_unknown_family_is_not_found() {
    let app = app();
    seed_member(app.store(), "m1", "Pérez", &[]);
    let created = saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Member("m1".to_string())],
        ))
        .expect("create should succeed"),
    );

    let result = app.update_companionship(
        &created.id,
        CompanionshipPatch {
            companions: Some(names(&["Ana", "Jorge"])),
            remove_families: vec!["Familia Perez".to_string()],
            ..patch()
        },
    );
    match result {
        Err(AppError::NotFound { kind, id }) => {
            assert_eq!(kind, "family");
            assert_eq!(id, "Familia Perez");
        }
        other => panic!("expected NotFound, got {:?}", other),
    }

    let stored = app
        .show_companionship(&created.id)
        .expect("lookup should succeed")
        .expect("companionship should remain");
    assert_eq!(stored.companions, names(&["Ana", "Luis"]));
    assert_eq!(stored.families.len(), 1);
    assert_eq!(teachers(app.store(), "m1"), names(&["Ana", "Luis"]));
}

#[test]
fn create_keeps_the_save_when_district_placement_fails() {
    let app = app();
    let page = app
        .load_ministering_page(datetime!(2026-03-01 10:00 UTC))
        .expect("page should load");
    app.store()
        .connection()
        .execute_batch(
            "CREATE TRIGGER lock_districts BEFORE UPDATE ON documents
             WHEN NEW.collection = 'ministering_districts'
             BEGIN SELECT RAISE(ABORT, 'districts are locked'); END;",
        )
        .expect("trigger should install");

    let outcome = app
        .create_companionship(NewCompanionship {
            district: Some(page.districts[0].id.clone()),
            ..new_companionship(&["Ana", "Luis"], Vec::new())
        })
        .expect("create should succeed");
    let SaveOutcome::Saved {
        companionship,
        placement_error,
        ..
    } = outcome
    else {
        panic!("expected a saved companionship, got {:?}", outcome);
    };
    let error = placement_error.expect("placement error should be reported");
    assert!(error.contains("districts are locked"), "error was: {error}");

    assert!(app
        .show_companionship(&companionship.id)
        .expect("lookup should succeed")
        .is_some());
    assert!(app
        .district_of(&companionship.id)
        .expect("lookup should succeed")
        .is_none());
}

#[test]
fn update_moves_between_districts() {
    let app = app();
    let page = app
        .load_ministering_page(datetime!(2026-03-01 10:00 UTC))
        .expect("page should load");
    let created = saved(
        app.create_companionship(NewCompanionship {
            district: Some(page.districts[0].id.clone()),
            ..new_companionship(&["Ana", "Luis"], Vec::new())
        })
        .expect("create should succeed"),
    );

    saved(
        app.update_companionship(
            &created.id,
            CompanionshipPatch {
                district: DistrictChange::MoveTo(page.districts[2].id.clone()),
                ..patch()
            },
        )
        .expect("move should succeed"),
    );
    let holders = app
        .list_districts()
        .expect("districts should list")
        .into_iter()
        .filter(|district| district.contains(&created.id))
        .map(|district| district.id)
        .collect::<Vec<_>>();
    assert_eq!(holders, vec![page.districts[2].id.clone()]);

    saved(
        app.update_companionship(
            &created.id,
            CompanionshipPatch {
                district: DistrictChange::Clear,
                ..patch()
            },
        )
        .expect("clear should succeed"),
    );
    assert!(app
        .district_of(&created.id)
        .expect("lookup should succeed")
        .is_none());
}

#[test]
fn delete_cascades_teachers_and_district_membership() {
    let app = app();
    let page = app
        .load_ministering_page(datetime!(2026-03-01 10:00 UTC))
        .expect("page should load");
    seed_member(app.store(), "m1", "Pérez", &["Marta"]);
    let created = saved(
        app.create_companionship(NewCompanionship {
            district: Some(page.districts[0].id.clone()),
            ..new_companionship(&["Ana", "Luis"], vec![FamilyInput::Member("m1".to_string())])
        })
        .expect("create should succeed"),
    );

    let summary = app
        .delete_companionship(&created.id)
        .expect("delete should succeed");
    assert_eq!(summary.sync.updated_members, names(&["m1"]));
    assert_eq!(teachers(app.store(), "m1"), names(&["Marta"]));
    assert!(app
        .show_companionship(&created.id)
        .expect("show should succeed")
        .is_none());
    assert!(app
        .list_districts()
        .expect("districts should list")
        .iter()
        .all(|district| district.companionship_ids.is_empty()));
}

#[test]
fn urgent_flags_can_be_raised_and_resolved() {
    let app = app();
    let created = saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Manual("Familia Lima".to_string())],
        ))
        .expect("create should succeed"),
    );

    app.mark_family_urgent(&created.id, "Familia Lima", " Necesita comida ")
        .expect("urgent should succeed");
    let needs = app.urgent_needs().expect("needs should load");
    assert_eq!(needs.len(), 1);
    assert_eq!(needs[0].observation, "Necesita comida");

    let resolved = app
        .resolve_family_urgent(&created.id, "Familia Lima")
        .expect("resolve should succeed");
    assert!(!resolved.families[0].is_urgent);
    assert!(resolved.families[0].observation.is_empty());
    assert!(app.urgent_needs().expect("needs should load").is_empty());

    let missing = app.set_family_visited(&created.id, "Familia Nadie", true);
    assert!(matches!(
        missing,
        Err(AppError::NotFound { kind: "family", .. })
    ));
}

#[test]
fn unassigned_members_exclude_assigned_and_deceased() {
    let app = app();
    let perez = app
        .add_member("Raúl", "Pérez", MemberStatus::Active)
        .expect("member should be added");
    let vega = app
        .add_member("Inés", "Vega", MemberStatus::Inactive)
        .expect("member should be added");
    app.add_member("José", "Mora", MemberStatus::Deceased)
        .expect("member should be added");
    saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Member(perez.id)],
        ))
        .expect("create should succeed"),
    );

    let open = app
        .unassigned_members()
        .expect("unassigned should load")
        .into_iter()
        .map(|member| member.id)
        .collect::<Vec<_>>();
    assert_eq!(open, vec![vega.id]);
}

#[test]
fn first_page_load_seeds_marker_and_bootstraps_districts() {
    let app = app();
    let now = datetime!(2026-03-01 10:00 UTC);
    let page = app.load_ministering_page(now).expect("page should load");
    assert!(page.marker_seeded);
    assert!(page.rollover.is_none());
    assert_eq!(page.districts_created, 3);
    assert_eq!(page.stats.completion, 100);
    assert_eq!(
        app.store()
            .get_item(LAST_RESET_KEY)
            .expect("marker should read")
            .as_deref(),
        Some("2026-03-01T10:00:00Z")
    );

    let again = app
        .load_ministering_page(now + Duration::days(3))
        .expect("page should load");
    assert!(!again.marker_seeded);
    assert_eq!(again.districts_created, 0);
    assert_eq!(again.districts.len(), 3);
}

#[test]
fn monthly_cycle_records_history_and_resets_visits() {
    let app = app();
    seed_member(app.store(), "m1", "Pérez", &[]);
    let start = datetime!(2026-01-05 09:00 UTC);
    app.load_ministering_page(start).expect("first load");

    let created = saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Member("m1".to_string())],
        ))
        .expect("create should succeed"),
    );

    let february = start + Duration::days(31);
    let page = app.load_ministering_page(february).expect("rollover load");
    let report = page.rollover.expect("rollover should have run");
    assert_eq!(report.month_key, "2026-01");
    assert_eq!(report.percentage, 0);
    assert_eq!(page.stats.previous_month, Some(0));

    app.set_family_visited(&created.id, "Familia Pérez", true)
        .expect("visit should succeed");
    let later = app
        .load_ministering_page(february + Duration::days(1))
        .expect("page should load");
    assert!(later.rollover.is_none());
    assert_eq!(later.stats.completion, 100);

    let march = february + Duration::days(31);
    let page = app.load_ministering_page(march).expect("rollover load");
    let report = page.rollover.expect("rollover should have run");
    assert_eq!(report.month_key, "2026-02");
    assert_eq!(report.percentage, 100);
    assert!(!page.companionships[0].families[0].visited_this_month);
    assert_eq!(page.stats.completion, 0);
    assert_eq!(page.stats.previous_month, Some(100));

    let history = app.list_history().expect("history should load");
    let keys = history
        .iter()
        .map(|entry| (entry.id.as_str(), entry.percentage))
        .collect::<Vec<_>>();
    assert_eq!(keys, vec![("2026-02", 100), ("2026-01", 0)]);
}

#[test]
fn unsaved_marker_does_not_rewrite_archived_completion() {
    let app = app();
    seed_member(app.store(), "m1", "Pérez", &[]);
    let start = datetime!(2026-01-05 09:00 UTC);
    app.load_ministering_page(start).expect("first load");
    let created = saved(
        app.create_companionship(new_companionship(
            &["Ana", "Luis"],
            vec![FamilyInput::Member("m1".to_string())],
        ))
        .expect("create should succeed"),
    );
    app.set_family_visited(&created.id, "Familia Pérez", true)
        .expect("visit should succeed");

    let connection = app.store().connection();
    connection
        .execute_batch(
            "CREATE TRIGGER lock_meta BEFORE INSERT ON meta
             BEGIN SELECT RAISE(ABORT, 'meta is locked'); END;",
        )
        .expect("trigger should install");
    let february = start + Duration::days(31);
    assert!(app.load_ministering_page(february).is_err());
    connection
        .execute_batch("DROP TRIGGER lock_meta;")
        .expect("trigger should drop");

    let page = app
        .load_ministering_page(february + Duration::hours(1))
        .expect("retry should load");
    let report = page.rollover.expect("rollover should repeat");
    assert_eq!(report.month_key, "2026-01");
    assert_eq!(report.percentage, 100);

    let history = app.list_history().expect("history should load");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].percentage, 100);
    let settled = app
        .load_ministering_page(february + Duration::days(1))
        .expect("page should load");
    assert!(settled.rollover.is_none());
}

#[test]
fn forced_rollover_ignores_the_interval() {
    let app = app();
    let now = datetime!(2026-04-10 09:00 UTC);
    app.load_ministering_page(now).expect("first load");

    let outcome = app
        .run_rollover(now + Duration::days(1), false)
        .expect("rollover should evaluate");
    assert!(matches!(outcome, RolloverOutcome::Current { days_since: 1 }));

    let forced = app
        .run_rollover(now + Duration::days(1), true)
        .expect("forced rollover should run");
    let RolloverOutcome::Rolled(report) = forced else {
        panic!("expected a rollover, got {:?}", forced);
    };
    assert!(report.forced);
    assert_eq!(report.month_key, "2026-03");
}
