pub mod non_api_structs;
pub mod relationship;

use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use relationship::{Action, RelationshipView, TransitionError, TransitionErrorKind};

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Url(pub String);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(pub u64);
impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);
impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque avatar reference as the server hands it out.
///
/// Uploaded avatars come back as a server-relative `/uploads/...` path and
/// need the asset host in front of them; anything else is already a full URL.
#[derive(Eq, PartialEq, Hash, Clone, Debug, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct AvatarRef(pub String);
impl AvatarRef {
    pub fn resolve(&self, asset_base: &str) -> Url {
        if self.0.starts_with("/uploads/") {
            Url(asset_base.trim_end_matches('/').to_string() + &self.0)
        } else {
            Url(self.0.clone())
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub avatar: AvatarRef,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub connections: u32,
}

/// A row of `GET /users/networking`: a user plus the viewer-relative flags.
#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkUser {
    #[serde(flatten)]
    pub user: User,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub has_incoming_request: bool,
    #[serde(default)]
    pub has_outgoing_request: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("user {user} carries conflicting relationship flags")]
pub struct InconsistentRelationship {
    pub user: UserId,
}

impl NetworkUser {
    pub fn from_view(user: User, view: RelationshipView) -> Self {
        Self {
            user,
            is_connected: view == RelationshipView::Connected,
            has_incoming_request: view == RelationshipView::IncomingPending,
            has_outgoing_request: view == RelationshipView::OutgoingPending,
        }
    }
    pub fn relationship(&self) -> Result<RelationshipView, InconsistentRelationship> {
        RelationshipView::from_flags(self.is_connected, self.has_incoming_request, self.has_outgoing_request)
            .ok_or(InconsistentRelationship { user: self.user.id })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub connection_id: ConnectionId,
    pub requester_id: UserId,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub avatar: AvatarRef,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub mutual_connections: u32,
    #[serde(default)]
    pub request_date: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Pending,
    Accepted,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipRecord {
    pub id: ConnectionId,
    pub requester_id: UserId,
    pub addressee_id: UserId,
    pub status: RecordStatus,
}
impl RelationshipRecord {
    pub fn involves(&self, a: UserId, b: UserId) -> bool {
        (self.requester_id == a && self.addressee_id == b) || (self.requester_id == b && self.addressee_id == a)
    }
    /// The record as seen by `viewer`; `None` when the viewer is not part of it.
    pub fn view_for(&self, viewer: UserId) -> Option<RelationshipView> {
        let requester_side = match self.status {
            RecordStatus::Accepted => RelationshipView::Connected,
            RecordStatus::Pending => RelationshipView::OutgoingPending,
        };
        if self.requester_id == viewer {
            Some(requester_side)
        } else if self.addressee_id == viewer {
            Some(requester_side.mirrored())
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Incoming,
    Outgoing,
}
impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "incoming",
            Direction::Outgoing => "outgoing",
        }
    }
}
impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_user_reads_camel_case_flags() {
        let json = r#"{"id":42,"name":"Nimal Silva","role":"Coach","location":"Kandy",
            "avatar":"/uploads/n.png","skills":["Cricket"],"connections":3,
            "isConnected":false,"hasIncomingRequest":true}"#;
        let row: NetworkUser = serde_json::from_str(json).unwrap();
        assert_eq!(row.user.id, UserId(42));
        assert!(!row.has_outgoing_request);
        assert_eq!(row.relationship(), Ok(RelationshipView::IncomingPending));
    }

    #[test]
    fn conflicting_flags_are_rejected() {
        let row = NetworkUser {
            user: User { id: UserId(7), ..Default::default() },
            is_connected: true,
            has_incoming_request: false,
            has_outgoing_request: true,
        };
        assert_eq!(row.relationship(), Err(InconsistentRelationship { user: UserId(7) }));
    }

    #[test]
    fn uploaded_avatars_resolve_against_asset_host() {
        let uploaded = AvatarRef("/uploads/a.png".into());
        assert_eq!(uploaded.resolve("http://localhost:8080/"), Url("http://localhost:8080/uploads/a.png".into()));
        let external = AvatarRef("https://cdn.example.org/a.png".into());
        assert_eq!(external.resolve("http://localhost:8080"), Url("https://cdn.example.org/a.png".into()));
    }

    #[test]
    fn record_view_depends_on_side() {
        let record = RelationshipRecord { id: ConnectionId(1), requester_id: UserId(1), addressee_id: UserId(2), status: RecordStatus::Pending };
        assert_eq!(record.view_for(UserId(1)), Some(RelationshipView::OutgoingPending));
        assert_eq!(record.view_for(UserId(2)), Some(RelationshipView::IncomingPending));
        assert_eq!(record.view_for(UserId(3)), None);
        let accepted = RelationshipRecord { status: RecordStatus::Accepted, ..record };
        assert_eq!(accepted.view_for(UserId(2)), Some(RelationshipView::Connected));
        assert!(accepted.involves(UserId(2), UserId(1)));
    }

    #[test]
    fn pending_request_wire_shape() {
        let json = r#"[{"connectionId":9,"requesterId":42,"name":"Kasun","role":"Athlete",
            "location":"Galle","avatar":"","skills":[],"mutualConnections":2,"requestDate":"2 days ago"}]"#;
        let pending: Vec<PendingRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(pending[0].connection_id, ConnectionId(9));
        assert_eq!(pending[0].requester_id, UserId(42));
        assert_eq!(serde_json::to_string(&Direction::Outgoing).unwrap(), "\"outgoing\"");
    }
}
