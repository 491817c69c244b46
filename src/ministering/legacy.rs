//! Compatibility shim for families recorded before `memberId` was stored.
//!
//! Such families only carry a label like "Familia Pérez". New families
//! sourced from the member directory always carry `memberId`, so nothing
//! else should depend on this lookup.

use tracing::debug;

use super::{repo, MEMBERS};
use crate::domain::member::Member;
use crate::store::{DocumentStore, Filter, Query, StoreError};

/// "Familia Pérez" -> "Pérez". Labels without the prefix are used as-is.
pub fn derived_last_name<'a>(family_name: &'a str, prefix: &str) -> &'a str {
    let trimmed = family_name.trim();
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return trimmed;
    }
    match trimmed.strip_prefix(prefix) {
        Some(rest) => rest.trim(),
        None => trimmed,
    }
}

/// Finds the single member whose `lastName` matches the label. Ambiguous
/// labels resolve to nothing.
pub fn resolve_member_by_family_name(
    store: &dyn DocumentStore,
    family_name: &str,
    prefix: &str,
) -> Result<Option<Member>, StoreError> {
    let last_name = derived_last_name(family_name, prefix);
    if last_name.is_empty() {
        return Ok(None);
    }

    // Two hits are enough to know the label is ambiguous.
    let matches = store.query(
        MEMBERS,
        &Query::all()
            .filter(Filter::eq("lastName", last_name))
            .limit(2),
    )?;
    match matches.as_slice() {
        [only] => Ok(Some(repo::decode_member(only)?)),
        [] => Ok(None),
        _ => {
            debug!(
                family = family_name,
                "family label matches several members; skipping"
            );
            Ok(None)
        }
    }
}
