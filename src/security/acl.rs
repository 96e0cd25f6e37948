//! POSIX-ACL-style access control entries layered on top of plain UNIX mode bits.
//!
//! Grounded on the `FileAcl`/`AclEntry` shapes in the reference security manager:
//! an ACL is an ordered list of (type, id, permission-bits) entries plus a
//! default mask, evaluated in POSIX.1e order (owner, named users, owning
//! group, named groups, other) with the first matching entry deciding access.

/// Which principal an ACL entry applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AclEntryType {
    UserObj,
    User,
    GroupObj,
    Group,
    Other,
    Mask,
}

/// Read/write/execute permission bits, matching POSIX mode semantics.
pub mod perm {
    pub const READ: u32 = 0o4;
    pub const WRITE: u32 = 0o2;
    pub const EXECUTE: u32 = 0o1;
}

#[derive(Clone, Debug)]
pub struct AclEntry {
    pub entry_type: AclEntryType,
    /// UID or GID this entry applies to; ignored for `UserObj`/`GroupObj`/`Other`.
    pub id: u32,
    pub permissions: u32,
}

impl AclEntry {
    pub fn new(entry_type: AclEntryType, id: u32, permissions: u32) -> Self {
        Self { entry_type, id, permissions }
    }
}

/// The full ACL attached to one file or directory.
#[derive(Clone, Debug, Default)]
pub struct FileAcl {
    pub entries: Vec<AclEntry>,
    pub is_directory: bool,
}

impl FileAcl {
    pub fn new(is_directory: bool) -> Self {
        Self { entries: Vec::new(), is_directory }
    }

    pub fn add_entry(&mut self, entry: AclEntry) {
        self.entries.retain(|e| !(e.entry_type == entry.entry_type && e.id == entry.id));
        self.entries.push(entry);
    }

    pub fn remove_entry(&mut self, entry_type: AclEntryType, id: u32) {
        self.entries.retain(|e| !(e.entry_type == entry_type && e.id == id));
    }

    /// Evaluates whether `requested_perms` is granted to a principal identified
    /// by `uid`/`gid`/`gids`, given the file's owner `owner_uid`/`owner_gid`.
    ///
    /// POSIX.1e evaluation order: owner entry first, then named-user entries,
    /// then owning-group/named-group entries (masked by the `Mask` entry if
    /// present), then `other`. The first class that applies to the caller
    /// decides the outcome - a named-group match does not fall through to
    /// `other` even if it denies the request.
    pub fn has_permission(
        &self,
        uid: u32,
        gid: u32,
        gids: &[u32],
        owner_uid: u32,
        owner_gid: u32,
        requested_perms: u32,
    ) -> bool {
        if uid == owner_uid {
            if let Some(e) = self.entries.iter().find(|e| e.entry_type == AclEntryType::UserObj) {
                return e.permissions & requested_perms == requested_perms;
            }
        }
        if let Some(e) =
            self.entries.iter().find(|e| e.entry_type == AclEntryType::User && e.id == uid)
        {
            let mask = self.effective_mask();
            return (e.permissions & mask) & requested_perms == requested_perms;
        }
        let in_group = gid == owner_gid || gids.contains(&owner_gid);
        if in_group {
            if let Some(e) = self.entries.iter().find(|e| e.entry_type == AclEntryType::GroupObj) {
                let mask = self.effective_mask();
                return (e.permissions & mask) & requested_perms == requested_perms;
            }
        }
        for group_id in std::iter::once(gid).chain(gids.iter().copied()) {
            if let Some(e) = self
                .entries
                .iter()
                .find(|e| e.entry_type == AclEntryType::Group && e.id == group_id)
            {
                let mask = self.effective_mask();
                return (e.permissions & mask) & requested_perms == requested_perms;
            }
        }
        if let Some(e) = self.entries.iter().find(|e| e.entry_type == AclEntryType::Other) {
            return e.permissions & requested_perms == requested_perms;
        }
        // No ACL configured for this principal class: fall back to mode bits
        // having already been checked by the caller before reaching here.
        true
    }

    fn effective_mask(&self) -> u32 {
        self.entries
            .iter()
            .find(|e| e.entry_type == AclEntryType::Mask)
            .map(|e| e.permissions)
            .unwrap_or(perm::READ | perm::WRITE | perm::EXECUTE)
    }
}
