//! Ministering companionship/district consistency engine.
//!
//! Companionships, districts, history snapshots, and members live in
//! loosely linked collections. The submodules keep them consistent:
//! [`validator`] rejects double assignments, [`sync`] mirrors companion
//! names into each member's `ministeringTeachers`, [`districts`] keeps a
//! companionship in at most one district, and [`rollover`] resets the
//! monthly visit flags after archiving the previous month's completion.

pub mod districts;
pub mod legacy;
pub mod repo;
pub mod rollover;
pub mod stats;
pub mod sync;
pub mod validator;

pub const COMPANIONSHIPS: &str = "ministering";
pub const DISTRICTS: &str = "ministering_districts";
pub const HISTORY: &str = "ministering_history";
pub const MEMBERS: &str = "members";

#[cfg(test)]
pub(crate) mod fixtures;
