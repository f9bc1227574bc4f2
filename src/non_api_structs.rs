use std::fmt;
use serde::{Deserialize, Serialize};
use crate::{Direction, NetworkUser, RelationshipView, User, UserId, InconsistentRelationship};

/// Logical cache key. Never sent over the wire.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum QueryKey {
    NetworkUsers,
    PendingRequests(Direction),
}
impl QueryKey {
    pub const ALL: [QueryKey; 3] = [
        QueryKey::NetworkUsers,
        QueryKey::PendingRequests(Direction::Incoming),
        QueryKey::PendingRequests(Direction::Outgoing),
    ];

    pub fn segments(&self) -> Vec<&'static str> {
        match self {
            QueryKey::NetworkUsers => vec!["networkUsers"],
            QueryKey::PendingRequests(direction) => vec!["pendingRequests", direction.as_str()],
        }
    }
}
impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments().join("/"))
    }
}

/// A directory row once the wire flags have been collapsed.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
pub struct DirectoryEntry {
    pub user: User,
    pub relationship: RelationshipView,
}
impl TryFrom<NetworkUser> for DirectoryEntry {
    type Error = InconsistentRelationship;

    fn try_from(value: NetworkUser) -> Result<Self, Self::Error> {
        let relationship = value.relationship()?;
        Ok(Self { user: value.user, relationship })
    }
}

pub fn find_entry(entries: &[DirectoryEntry], id: UserId) -> Option<&DirectoryEntry> {
    entries.iter().find(|e| e.user.id == id)
}

/// Free-text narrowing of the directory over name, role, location and skills.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DirectoryFilter {
    needle: String,
}
impl DirectoryFilter {
    pub fn new(query: impl AsRef<str>) -> Self {
        Self { needle: query.as_ref().trim().to_lowercase() }
    }
    pub fn matches(&self, user: &User) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&self.needle);
        hit(&user.name) || hit(&user.role) || hit(&user.location) || user.skills.iter().any(|s| hit(s))
    }
    pub fn apply<'a>(&self, entries: &'a [DirectoryEntry]) -> Vec<&'a DirectoryEntry> {
        entries.iter().filter(|e| self.matches(&e.user)).collect()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSummary {
    pub total: usize,
    pub athletes: usize,
    pub coaches: usize,
    pub other: usize,
}
impl ConnectionSummary {
    pub fn from_entries(entries: &[DirectoryEntry]) -> Self {
        entries
            .iter()
            .filter(|e| e.relationship == RelationshipView::Connected)
            .fold(Self::default(), |mut summary, e| {
                let role = e.user.role.to_lowercase();
                summary.total += 1;
                if role.contains("athlete") {
                    summary.athletes += 1;
                } else if role.contains("coach") {
                    summary.coaches += 1;
                } else {
                    summary.other += 1;
                }
                summary
            })
    }
}
