//! Privilege set carried by every descriptor.
//!
//! Normalization of persisted privilege records lives in the catalog
//! builder's fixup pass; this module only holds the data shape.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Role that owns newly created system objects.
pub const ROOT_USER: &str = "root";

/// Role granted to operators; always retains full privileges.
pub const ADMIN_ROLE: &str = "admin";

bitflags! {
    /// Privilege bits grantable on a catalog object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PrivilegeSet: u32 {
        const CREATE = 0b0000_0001;
        const DROP   = 0b0000_0010;
        const SELECT = 0b0000_0100;
        const INSERT = 0b0000_1000;
        const DELETE = 0b0001_0000;
        const UPDATE = 0b0010_0000;
    }
}

impl PrivilegeSet {
    /// Every grantable privilege.
    pub fn full() -> PrivilegeSet {
        PrivilegeSet::all()
    }
}

/// A single grantee's privileges on a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeGrant {
    pub grantee: String,
    pub privileges: PrivilegeSet,
    /// Privileges the grantee may in turn grant to others.
    pub grant_option: PrivilegeSet,
}

/// Privilege records attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeDescriptor {
    pub owner: String,
    pub grants: Vec<PrivilegeGrant>,
    pub version: u32,
}

impl PrivilegeDescriptor {
    /// Base privileges for a freshly created object: the owner plus the
    /// `admin` and `root` roles each hold every privilege.
    pub fn base(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        let mut grants: Vec<PrivilegeGrant> = [owner.as_str(), ADMIN_ROLE, ROOT_USER]
            .iter()
            .map(|grantee| PrivilegeGrant {
                grantee: (*grantee).to_string(),
                privileges: PrivilegeSet::full(),
                grant_option: PrivilegeSet::empty(),
            })
            .collect();
        grants.sort_by(|a, b| a.grantee.cmp(&b.grantee));
        grants.dedup_by(|a, b| a.grantee == b.grantee);
        Self {
            owner,
            grants,
            version: 1,
        }
    }

    pub fn find_grant(&self, grantee: &str) -> Option<&PrivilegeGrant> {
        self.grants.iter().find(|g| g.grantee == grantee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_privileges_include_owner_admin_root() {
        let privs = PrivilegeDescriptor::base("app_user");
        for grantee in ["app_user", ADMIN_ROLE, ROOT_USER] {
            let grant = privs.find_grant(grantee).expect("missing grant");
            assert_eq!(grant.privileges, PrivilegeSet::full());
        }
    }

    #[test]
    fn test_base_privileges_dedupe_owner_root() {
        // Owner may itself be root; the grant list must not repeat it.
        let privs = PrivilegeDescriptor::base(ROOT_USER);
        assert_eq!(
            privs.grants.iter().filter(|g| g.grantee == ROOT_USER).count(),
            1
        );
    }

    #[test]
    fn test_grants_are_sorted() {
        let privs = PrivilegeDescriptor::base("zeta");
        let mut names: Vec<&str> = privs.grants.iter().map(|g| g.grantee.as_str()).collect();
        let sorted = {
            let mut s = names.clone();
            s.sort();
            s
        };
        assert_eq!(names, sorted);
        names.dedup();
        assert_eq!(names.len(), privs.grants.len());
    }
}
