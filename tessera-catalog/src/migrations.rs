//! Registered migration steps.
//!
//! Migrations run after the fixup pass, in registration order, and only
//! when the caller asks for them. Unlike fixups they may rewrite semantic
//! content that older versions of the system persisted differently.

use tessera_core::{DatabaseDescriptor, MigrationError, PrivilegeSet, TableDescriptor};

/// Grant-option backfill: a grantee holding every privilege also receives
/// the right to grant them. Older versions persisted grants without the
/// grant-option bits.
pub fn add_grant_options_table(desc: &mut TableDescriptor) -> Result<bool, MigrationError> {
    Ok(add_grant_options(&mut desc.privileges))
}

/// Database flavor of the grant-option backfill.
pub fn add_grant_options_database(desc: &mut DatabaseDescriptor) -> Result<bool, MigrationError> {
    Ok(add_grant_options(&mut desc.privileges))
}

fn add_grant_options(privs: &mut tessera_core::PrivilegeDescriptor) -> bool {
    let mut changed = false;
    for grant in &mut privs.grants {
        if grant.privileges == PrivilegeSet::full() && grant.grant_option != grant.privileges {
            grant.grant_option = grant.privileges;
            changed = true;
        }
    }
    changed
}
