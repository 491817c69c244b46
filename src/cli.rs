use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub use crate::cli_ops::*;

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "quorum")]
#[command(bin_name = "quorum")]
#[command(version)]
#[command(about = "Ministering companionships, districts, and monthly visit tracking")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "QUORUM_DB_PATH",
        default_value = ".quorum/state.sqlite",
        help = "Path to the local SQLite database."
    )]
    pub db: String,

    #[arg(
        short = 'c',
        long,
        env = "QUORUM_CONFIG",
        default_value = ".quorum/config.toml",
        help = "Path to the TOML config file (optional)."
    )]
    pub config: PathBuf,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (repeatable). QUORUM_LOG overrides."
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Manage the member directory.")]
    Member(MemberArgs),
    #[command(about = "Manage ministering companionships.")]
    Comp(CompArgs),
    #[command(about = "Mark a family as visited this month.")]
    Visit(VisitArgs),
    #[command(about = "Flag a family as having an urgent need.")]
    Urgent(UrgentArgs),
    #[command(about = "Clear a family's urgent flag and observation.")]
    Resolve(FamilyRefArgs),
    #[command(about = "List families with urgent needs.")]
    Needs(JsonArgs),
    #[command(about = "Manage ministering districts.")]
    District(DistrictArgs),
    #[command(about = "Load the ministering page: districts, rollover, and progress.")]
    Dashboard(DashboardArgs),
    #[command(about = "Run the monthly rollover if it is due.")]
    Rollover(RolloverArgs),
    #[command(about = "Show archived monthly completion.")]
    History(JsonArgs),
    #[command(about = "Generate or install shell completions.")]
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
#[command(about = "Output options.")]
pub struct JsonArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Generate or install shell completions.")]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish). Auto-detected if omitted.")]
    pub shell: Option<String>,

    #[arg(
        short = 'i',
        long = "install",
        help = "Write completions to the canonical path for the shell."
    )]
    pub install: bool,
}

#[derive(Debug, Args)]
#[command(about = "Identify one family of a companionship.")]
pub struct FamilyRefArgs {
    #[arg(help = "Companionship id.")]
    pub companionship: String,

    #[arg(help = "Family name as shown, e.g. \"Familia Pérez\".")]
    pub family: String,
}

#[derive(Debug, Args)]
#[command(about = "Mark a family visited.")]
pub struct VisitArgs {
    #[command(flatten)]
    pub target: FamilyRefArgs,

    #[arg(short = 'u', long, help = "Clear the visited flag instead.")]
    pub undo: bool,
}

#[derive(Debug, Args)]
#[command(about = "Flag an urgent need.")]
pub struct UrgentArgs {
    #[command(flatten)]
    pub target: FamilyRefArgs,

    #[arg(help = "Observation describing the need.")]
    pub observation: String,
}

#[derive(Debug, Args)]
#[command(about = "Load the ministering page.")]
pub struct DashboardArgs {
    #[arg(
        long,
        value_parser = parse_timestamp,
        help = "Evaluate as of this RFC3339 time instead of now."
    )]
    pub at: Option<OffsetDateTime>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(about = "Run the monthly rollover.")]
pub struct RolloverArgs {
    #[arg(short = 'f', long, help = "Roll over even if the interval has not elapsed.")]
    pub force: bool,

    #[arg(
        long,
        value_parser = parse_timestamp,
        help = "Evaluate as of this RFC3339 time instead of now."
    )]
    pub at: Option<OffsetDateTime>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(raw.trim(), &Rfc3339)
        .map_err(|err| format!("expected an RFC3339 timestamp: {err}"))
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
