use clap::{Args, Subcommand};

use crate::domain::member::MemberStatus;

#[derive(Debug, Args)]
#[command(
    about = "Member commands.",
    long_about = "Add, list, or show members of the directory."
)]
pub struct MemberArgs {
    #[command(subcommand)]
    pub command: MemberSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum MemberSubcommands {
    #[command(about = "Add a member.")]
    Add(MemberAddArgs),
    #[command(about = "List members by last name.", alias = "list")]
    Ls(MemberListArgs),
    #[command(about = "Show one member and their ministering teachers.")]
    Show(IdArgs),
}

#[derive(Debug, Args)]
pub struct MemberAddArgs {
    #[arg(help = "First name.")]
    pub first_name: String,

    #[arg(help = "Last name; also used for the family label.")]
    pub last_name: String,

    #[arg(
        short = 's',
        long,
        default_value = "active",
        help = "Status: active, less_active, inactive, or deceased."
    )]
    pub status: MemberStatus,
}

#[derive(Debug, Args)]
pub struct MemberListArgs {
    #[arg(
        short = 'u',
        long,
        help = "Only members whose household no companionship ministers to."
    )]
    pub unassigned: bool,

    #[arg(
        short = 't',
        long,
        conflicts_with = "unassigned",
        help = "Only members this companion ministers to."
    )]
    pub teacher: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct IdArgs {
    #[arg(help = "Document id.")]
    pub id: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(
    about = "Companionship commands.",
    long_about = "Add, edit, remove, or list companionships. Assignments are validated so no \
                  family or companion is booked twice."
)]
pub struct CompArgs {
    #[command(subcommand)]
    pub command: CompSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum CompSubcommands {
    #[command(about = "Create a companionship.")]
    Add(CompAddArgs),
    #[command(about = "Edit companions, families, or district.")]
    Edit(CompEditArgs),
    #[command(about = "Delete a companionship.", alias = "remove")]
    Rm(CompRemoveArgs),
    #[command(about = "List companionships.", alias = "list")]
    Ls(CompListArgs),
    #[command(about = "Show one companionship.")]
    Show(IdArgs),
}

#[derive(Debug, Args)]
pub struct CompAddArgs {
    #[arg(
        short = 'c',
        long = "companion",
        required = true,
        help = "Companion name (repeat for each companion)."
    )]
    pub companions: Vec<String>,

    #[arg(
        short = 'm',
        long = "member",
        help = "Assign the household of this member id (repeatable)."
    )]
    pub members: Vec<String>,

    #[arg(
        short = 'f',
        long = "family",
        help = "Assign a family by free-text label (repeatable)."
    )]
    pub families: Vec<String>,

    #[arg(short = 'd', long, help = "Place the companionship in this district id.")]
    pub district: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompEditArgs {
    #[arg(help = "Companionship id.")]
    pub id: String,

    #[arg(
        short = 'c',
        long = "companion",
        help = "Replace the companions (repeat for each companion)."
    )]
    pub companions: Vec<String>,

    #[arg(
        short = 'm',
        long = "add-member",
        help = "Add the household of this member id (repeatable)."
    )]
    pub add_members: Vec<String>,

    #[arg(
        short = 'f',
        long = "add-family",
        help = "Add a family by free-text label (repeatable)."
    )]
    pub add_families: Vec<String>,

    #[arg(
        short = 'r',
        long = "remove-family",
        help = "Remove a family by its label (repeatable)."
    )]
    pub remove_families: Vec<String>,

    #[arg(
        short = 'd',
        long,
        conflicts_with = "no_district",
        help = "Move to this district id."
    )]
    pub district: Option<String>,

    #[arg(long = "no-district", help = "Remove from every district.")]
    pub no_district: bool,
}

#[derive(Debug, Args)]
pub struct CompRemoveArgs {
    #[arg(help = "Companionship id.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct CompListArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
#[command(
    about = "District commands.",
    long_about = "List, add, remove, and arrange ministering districts and their leaders."
)]
pub struct DistrictArgs {
    #[command(subcommand)]
    pub command: DistrictSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum DistrictSubcommands {
    #[command(about = "List districts by name.", alias = "list")]
    Ls(DistrictListArgs),
    #[command(about = "Add a district with the next sequential name.")]
    Add,
    #[command(about = "Delete a district; its companionships become unassigned.")]
    Rm(DistrictRemoveArgs),
    #[command(about = "Toggle a companionship in one district.")]
    Toggle(DistrictToggleArgs),
    #[command(about = "Move a companionship so it belongs to exactly one district.")]
    Move(DistrictMoveArgs),
    #[command(about = "Set or clear a district leader.")]
    Leader(DistrictLeaderArgs),
}

#[derive(Debug, Args)]
pub struct DistrictListArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct DistrictRemoveArgs {
    #[arg(help = "District id.")]
    pub id: String,
}

#[derive(Debug, Args)]
pub struct DistrictToggleArgs {
    #[arg(help = "District id.")]
    pub district: String,

    #[arg(help = "Companionship id.")]
    pub companionship: String,
}

#[derive(Debug, Args)]
pub struct DistrictMoveArgs {
    #[arg(help = "Companionship id.")]
    pub companionship: String,

    #[arg(help = "Target district id. Omit to leave the companionship unassigned.")]
    pub district: Option<String>,
}

#[derive(Debug, Args)]
pub struct DistrictLeaderArgs {
    #[arg(help = "District id.")]
    pub district: String,

    #[arg(help = "Leader member id. Omit to clear the leader.")]
    pub member: Option<String>,
}
