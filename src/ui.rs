use std::io::{self, IsTerminal};

use crate::app::MinisteringPage;
use crate::domain::companionship::Companionship;
use crate::domain::district::MinisteringDistrict;
use crate::domain::history::MinisteringHistory;
use crate::domain::member::{Member, MemberStatus};
use crate::ministering::rollover::{RolloverOutcome, RolloverReport};
use crate::ministering::stats::{DistrictProgress, UrgentNeed};
use crate::ministering::sync::SyncReport;

pub fn print_member_list(members: &[Member], heading: &str) {
    let palette = Palette::auto();
    println!("{}", palette.heading(heading));
    if members.is_empty() {
        println!("{}", palette.dim("no members"));
        return;
    }
    for member in members {
        println!(
            "{} {} {}",
            palette.id(&member.id),
            member.full_name(),
            palette.status(member.status)
        );
    }
    println!("{}", palette.dim(&format!("{} member(s)", members.len())));
}

pub fn print_member_show(member: &Member) {
    let palette = Palette::auto();
    println!("{} {}", palette.id(&member.id), member.full_name());
    println!("status: {}", palette.status(member.status));
    if member.ministering_teachers.is_empty() {
        println!("ministering teachers: {}", palette.dim("none"));
    } else {
        println!(
            "ministering teachers: {}",
            member.ministering_teachers.join(", ")
        );
    }
}

pub fn print_companionship_list(
    companionships: &[Companionship],
    districts: &[MinisteringDistrict],
) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Companionships"));
    if companionships.is_empty() {
        println!("{}", palette.dim("no companionships"));
        return;
    }
    for companionship in companionships {
        let district = districts
            .iter()
            .find(|district| district.contains(&companionship.id));
        println!(
            "{}",
            format_companionship_row(companionship, district, &palette)
        );
    }
    println!(
        "{}",
        palette.dim(&format!("{} companionship(s)", companionships.len()))
    );
}

fn format_companionship_row(
    companionship: &Companionship,
    district: Option<&MinisteringDistrict>,
    palette: &Palette,
) -> String {
    let mut line = format!(
        "{} {} {} {}/{}",
        palette.id(&companionship.id),
        companionship.label(),
        palette.completion(companionship.completion()),
        companionship.visited_count(),
        companionship.families.len()
    );
    if let Some(district) = district {
        line.push(' ');
        line.push_str(&palette.dim(&format!("({})", district.name)));
    }
    let urgent = companionship.urgent_count();
    if urgent > 0 {
        line.push(' ');
        line.push_str(&palette.urgent(&format!("!{urgent}")));
    }
    line
}

pub fn print_companionship_show(
    companionship: &Companionship,
    district: Option<&MinisteringDistrict>,
) {
    let palette = Palette::auto();
    println!(
        "{}",
        format_companionship_row(companionship, district, &palette)
    );
    for family in &companionship.families {
        let mark = if family.visited_this_month { "x" } else { " " };
        let mut line = format!("  [{mark}] {}", family.name);
        if family.is_urgent {
            line.push(' ');
            line.push_str(&palette.urgent("URGENT"));
            if !family.observation.is_empty() {
                line.push_str(&format!(": {}", family.observation));
            }
        }
        println!("{line}");
    }
}

pub fn print_sync_warnings(report: &SyncReport) {
    if report.is_clean() && report.skipped_families.is_empty() {
        return;
    }
    let palette = Palette::auto();
    for family in &report.skipped_families {
        eprintln!(
            "{}",
            palette.dim(&format!("no member record for '{family}'; teachers not updated"))
        );
    }
    for failure in &report.failures {
        eprintln!(
            "{} teachers for '{}' not updated: {}",
            palette.urgent("warning:"),
            failure.family,
            failure.error
        );
    }
}

pub fn print_placement_warning(error: Option<&str>) {
    if let Some(error) = error {
        let palette = Palette::auto();
        eprintln!(
            "{} saved but district not updated: {error}",
            palette.urgent("warning:")
        );
    }
}

pub fn print_district_list(districts: &[MinisteringDistrict]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Districts"));
    if districts.is_empty() {
        println!("{}", palette.dim("no districts"));
        return;
    }
    for district in districts {
        let leader = district.leader_name.as_deref().unwrap_or("no leader");
        println!(
            "{} {} {} {}",
            palette.id(&district.id),
            district.name,
            palette.dim(&format!("[{leader}]")),
            palette.dim(&format!("{} companionship(s)", district.companionship_ids.len()))
        );
    }
}

pub fn print_dashboard(page: &MinisteringPage) {
    let palette = Palette::auto();
    if page.marker_seeded {
        println!("{}", palette.dim("rollover marker recorded; no reset this time"));
    }
    if let Some(report) = &page.rollover {
        println!("{}", format_rollover(report));
    }
    if page.districts_created > 0 || page.districts_renamed > 0 {
        println!(
            "{}",
            palette.dim(&format!(
                "districts created={} renamed={}",
                page.districts_created, page.districts_renamed
            ))
        );
    }

    let stats = &page.stats;
    println!("{}", palette.heading("Ministering"));
    println!(
        "completion {} ({} of {} families visited, {} companionship(s))",
        palette.completion(stats.completion),
        stats.visited,
        stats.families,
        stats.companionships
    );
    if let Some(change) = change_label(stats.previous_month, stats.change_from_previous) {
        println!("{}", palette.dim(&change));
    }

    println!("{}", palette.heading("Districts"));
    for row in &page.progress {
        println!("{}", format_progress_row(row, &palette));
    }

    if !page.urgent.is_empty() {
        println!("{}", palette.heading("Urgent"));
        for need in &page.urgent {
            println!("{}", format_need(need, &palette));
        }
    }
}

fn format_progress_row(row: &DistrictProgress, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {}/{}",
        row.name,
        palette.completion(row.completion),
        row.visited,
        row.families
    );
    if let Some(leader) = row.leader_name.as_deref() {
        line.push(' ');
        line.push_str(&palette.dim(&format!("[{leader}]")));
    }
    line
}

fn change_label(previous: Option<u8>, change: Option<i16>) -> Option<String> {
    match (previous, change) {
        (Some(previous), Some(change)) => Some(format!(
            "last month {previous}% ({change:+} pts)"
        )),
        _ => None,
    }
}

pub fn print_needs(needs: &[UrgentNeed]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Urgent needs"));
    if needs.is_empty() {
        println!("{}", palette.dim("no urgent needs"));
        return;
    }
    for need in needs {
        println!("{}", format_need(need, &palette));
    }
}

fn format_need(need: &UrgentNeed, palette: &Palette) -> String {
    let observation = if need.observation.is_empty() {
        palette.dim("(no observation)")
    } else {
        need.observation.clone()
    };
    format!(
        "{} {} {}: {}",
        palette.urgent("!"),
        need.family,
        palette.dim(&format!("({})", need.companionship)),
        observation
    )
}

pub fn print_rollover(outcome: &RolloverOutcome) {
    match outcome {
        RolloverOutcome::Seeded => println!("rollover marker recorded; nothing reset"),
        RolloverOutcome::Current { days_since } => {
            println!("rollover not due ({days_since} day(s) since last reset)")
        }
        RolloverOutcome::Rolled(report) => println!("{}", format_rollover(report)),
    }
}

fn format_rollover(report: &RolloverReport) -> String {
    format!(
        "rolled over {}: {}% archived, {} visited famil{} reset across {} companionship(s){}",
        report.month_key,
        report.percentage,
        report.families_reset,
        if report.families_reset == 1 { "y" } else { "ies" },
        report.companionships_reset,
        if report.forced { " (forced)" } else { "" }
    )
}

pub fn print_history(entries: &[MinisteringHistory]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("History"));
    if entries.is_empty() {
        println!("{}", palette.dim("no archived months"));
        return;
    }
    for entry in entries {
        println!("{} {}", entry.id, palette.completion(entry.percentage));
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn urgent(&self, text: &str) -> String {
        self.paint("1;31", text)
    }

    fn status(&self, status: MemberStatus) -> String {
        self.paint(
            status_color_code(status),
            &format!("[{}]", status.as_str().to_ascii_uppercase()),
        )
    }

    fn completion(&self, percentage: u8) -> String {
        self.paint(completion_color_code(percentage), &format!("{percentage}%"))
    }
}

fn status_color_code(status: MemberStatus) -> &'static str {
    match status {
        MemberStatus::Active => "32",
        MemberStatus::LessActive => "33",
        MemberStatus::Inactive => "90",
        MemberStatus::Deceased => "2",
    }
}

fn completion_color_code(percentage: u8) -> &'static str {
    match percentage {
        80..=u8::MAX => "32",
        50..=79 => "33",
        _ => "31",
    }
}

#[cfg(test)]
mod tests {
    use super::{change_label, completion_color_code, format_companionship_row, Palette};
    use crate::domain::district::MinisteringDistrict;
    use crate::ministering::fixtures::{companionship, family};

    fn plain() -> Palette {
        Palette { enabled: false }
    }

    #[test]
    fn companionship_row_shows_progress_district_and_urgency() {
        let mut urgent = family("Familia Soto", None, false);
        urgent.is_urgent = true;
        let row = companionship(
            "c1",
            &["Ana", "Luis"],
            vec![family("Familia Pérez", Some("m1"), true), urgent],
        );
        let district = MinisteringDistrict {
            id: "d1".to_string(),
            name: "Distrito 1".to_string(),
            companionship_ids: vec!["c1".to_string()],
            leader_id: None,
            leader_name: None,
            created_at: None,
        };

        assert_eq!(
            format_companionship_row(&row, Some(&district), &plain()),
            "c1 Ana y Luis 50% 1/2 (Distrito 1) !1"
        );
        assert_eq!(
            format_companionship_row(&row, None, &plain()),
            "c1 Ana y Luis 50% 1/2 !1"
        );
    }

    #[test]
    fn change_label_signs_the_delta() {
        assert_eq!(
            change_label(Some(80), Some(-5)).as_deref(),
            Some("last month 80% (-5 pts)")
        );
        assert_eq!(
            change_label(Some(60), Some(15)).as_deref(),
            Some("last month 60% (+15 pts)")
        );
        assert_eq!(change_label(None, None), None);
    }

    #[test]
    fn completion_colors_by_band() {
        assert_eq!(completion_color_code(100), "32");
        assert_eq!(completion_color_code(75), "33");
        assert_eq!(completion_color_code(10), "31");
    }

    #[test]
    fn disabled_palette_leaves_text_plain() {
        let palette = plain();
        assert_eq!(palette.completion(42), "42%");
        assert_eq!(palette.heading("Districts"), "Districts");
    }
}
