mod app;
mod cli;
mod cli_ops;
mod completions;
mod config;
mod db;
mod domain;
mod logging;
mod ministering;
mod store;
mod ui;

use time::OffsetDateTime;

use app::{AppError, CompanionshipPatch, DistrictChange, FamilyInput, NewCompanionship};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization should work")
    );
}

fn run() -> Result<(), AppError> {
    use clap::Parser;
    use cli::{Commands, CompSubcommands, DistrictSubcommands, MemberSubcommands};

    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref(), args.install);
    }

    let config = config::QuorumConfig::load(&cli.config)?;
    let app = app::App::open(&cli.db, config)?;

    match cli.command {
        Commands::Member(args) => match args.command {
            MemberSubcommands::Add(add) => {
                let member = app.add_member(&add.first_name, &add.last_name, add.status)?;
                println!("created member {} {}", member.id, member.full_name());
            }
            MemberSubcommands::Ls(ls) => {
                let (members, heading) = match (&ls.teacher, ls.unassigned) {
                    (Some(teacher), _) => (
                        app.members_taught_by(teacher)?,
                        format!("Ministered by {teacher}"),
                    ),
                    (None, true) => (app.unassigned_members()?, "Unassigned members".to_string()),
                    (None, false) => (app.list_members()?, "Members".to_string()),
                };
                if ls.json {
                    print_json(&members);
                } else {
                    ui::print_member_list(&members, &heading);
                }
            }
            MemberSubcommands::Show(show) => {
                let member = app
                    .show_member(&show.id)?
                    .ok_or_else(|| not_found("member", &show.id))?;
                if show.json {
                    print_json(&member);
                } else {
                    ui::print_member_show(&member);
                }
            }
        },
        Commands::Comp(args) => match args.command {
            CompSubcommands::Add(add) => {
                let input = NewCompanionship {
                    companions: add.companions,
                    families: family_inputs(add.members, add.families),
                    district: add.district,
                };
                let (companionship, sync, placement_error) =
                    saved(app.create_companionship(input)?)?;
                println!("created {} {}", companionship.id, companionship.label());
                ui::print_sync_warnings(&sync);
                ui::print_placement_warning(placement_error.as_deref());
            }
            CompSubcommands::Edit(edit) => {
                let patch = CompanionshipPatch {
                    companions: (!edit.companions.is_empty()).then_some(edit.companions),
                    add_families: family_inputs(edit.add_members, edit.add_families),
                    remove_families: edit.remove_families,
                    district: district_change(edit.district, edit.no_district),
                };
                let (companionship, sync, placement_error) =
                    saved(app.update_companionship(&edit.id, patch)?)?;
                println!("updated {} {}", companionship.id, companionship.label());
                ui::print_sync_warnings(&sync);
                ui::print_placement_warning(placement_error.as_deref());
            }
            CompSubcommands::Rm(rm) => {
                let summary = app.delete_companionship(&rm.id)?;
                println!(
                    "deleted {} {}",
                    summary.companionship.id,
                    summary.companionship.label()
                );
                ui::print_sync_warnings(&summary.sync);
            }
            CompSubcommands::Ls(ls) => {
                let companionships = app.list_companionships()?;
                if ls.json {
                    print_json(&companionships);
                } else {
                    let districts = app.list_districts()?;
                    ui::print_companionship_list(&companionships, &districts);
                }
            }
            CompSubcommands::Show(show) => {
                let companionship = app
                    .show_companionship(&show.id)?
                    .ok_or_else(|| not_found("companionship", &show.id))?;
                if show.json {
                    print_json(&companionship);
                } else {
                    let district = app.district_of(&companionship.id)?;
                    ui::print_companionship_show(&companionship, district.as_ref());
                }
            }
        },
        Commands::Visit(args) => {
            let target = &args.target;
            app.set_family_visited(&target.companionship, &target.family, !args.undo)?;
            let verb = if args.undo { "unmarked" } else { "visited" };
            println!("{verb} {} ({})", target.family, target.companionship);
        }
        Commands::Urgent(args) => {
            let target = &args.target;
            app.mark_family_urgent(&target.companionship, &target.family, &args.observation)?;
            println!("flagged {} as urgent", target.family);
        }
        Commands::Resolve(target) => {
            app.resolve_family_urgent(&target.companionship, &target.family)?;
            println!("resolved {}", target.family);
        }
        Commands::Needs(args) => {
            let needs = app.urgent_needs()?;
            if args.json {
                print_json(&needs);
            } else {
                ui::print_needs(&needs);
            }
        }
        Commands::District(args) => match args.command {
            DistrictSubcommands::Ls(ls) => {
                let districts = app.list_districts()?;
                if ls.json {
                    print_json(&districts);
                } else {
                    ui::print_district_list(&districts);
                }
            }
            DistrictSubcommands::Add => {
                let district = app.add_district()?;
                println!("created district {} {}", district.id, district.name);
            }
            DistrictSubcommands::Rm(rm) => {
                let district = app.remove_district(&rm.id)?;
                println!("deleted district {} {}", district.id, district.name);
            }
            DistrictSubcommands::Toggle(toggle) => {
                let member =
                    app.toggle_district_companionship(&toggle.district, &toggle.companionship)?;
                let verb = if member { "added to" } else { "removed from" };
                println!("{} {verb} {}", toggle.companionship, toggle.district);
            }
            DistrictSubcommands::Move(mv) => {
                app.move_companionship(&mv.companionship, mv.district.as_deref())?;
                match mv.district {
                    Some(district) => println!("moved {} to {district}", mv.companionship),
                    None => println!("{} is now unassigned", mv.companionship),
                }
            }
            DistrictSubcommands::Leader(leader) => {
                let district =
                    app.assign_district_leader(&leader.district, leader.member.as_deref())?;
                match district.leader_name.as_deref() {
                    Some(name) => println!("{} led by {name}", district.name),
                    None => println!("{} has no leader", district.name),
                }
            }
        },
        Commands::Dashboard(args) => {
            let now = args.at.unwrap_or_else(OffsetDateTime::now_utc);
            let page = app.load_ministering_page(now)?;
            if args.json {
                print_json(&page);
            } else {
                ui::print_dashboard(&page);
            }
        }
        Commands::Rollover(args) => {
            let now = args.at.unwrap_or_else(OffsetDateTime::now_utc);
            let outcome = app.run_rollover(now, args.force)?;
            if args.json {
                print_json(&outcome);
            } else {
                ui::print_rollover(&outcome);
            }
        }
        Commands::History(args) => {
            let entries = app.list_history()?;
            if args.json {
                print_json(&entries);
            } else {
                ui::print_history(&entries);
            }
        }
        Commands::Completions(_) => unreachable!("handled before the store is opened"),
    }
    Ok(())
}

fn family_inputs(members: Vec<String>, manual: Vec<String>) -> Vec<FamilyInput> {
    members
        .into_iter()
        .map(FamilyInput::Member)
        .chain(manual.into_iter().map(FamilyInput::Manual))
        .collect()
}

fn district_change(district: Option<String>, no_district: bool) -> DistrictChange {
    match (district, no_district) {
        (Some(id), _) => DistrictChange::MoveTo(id),
        (None, true) => DistrictChange::Clear,
        (None, false) => DistrictChange::Keep,
    }
}

type Saved = (
    domain::companionship::Companionship,
    ministering::sync::SyncReport,
    Option<String>,
);

fn saved(outcome: app::SaveOutcome) -> Result<Saved, AppError> {
    match outcome {
        app::SaveOutcome::Saved {
            companionship,
            sync,
            placement_error,
        } => Ok((companionship, sync, placement_error)),
        app::SaveOutcome::Rejected(issue) => Err(AppError::InvalidArgument(issue.to_string())),
    }
}

fn not_found(kind: &'static str, id: &str) -> AppError {
    AppError::NotFound {
        kind,
        id: id.to_string(),
    }
}
