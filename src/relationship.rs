//! The viewer-relative relationship with another user and the actions that
//! move it between states.
//!
//! | state             | actions             | next                  |
//! |-------------------|---------------------|-----------------------|
//! | `None`            | `Connect`           | `OutgoingPending`     |
//! | `OutgoingPending` | `Cancel`            | `None`                |
//! | `IncomingPending` | `Accept`, `Reject`  | `Connected`, `None`   |
//! | `Connected`       | `Remove`            | `None`                |

use std::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use crate::Direction;
use crate::non_api_structs::QueryKey;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipView {
    #[default]
    None,
    Connected,
    IncomingPending,
    OutgoingPending,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Connect,
    Cancel,
    Accept,
    Reject,
    Remove,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransitionErrorKind {
    /// A relationship already exists in a state the action cannot start from.
    Conflict,
    /// The record the action needs does not exist from the acting side.
    NotFound,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("cannot {action} while relationship is {from}")]
pub struct TransitionError {
    pub kind: TransitionErrorKind,
    pub action: Action,
    pub from: RelationshipView,
}

impl RelationshipView {
    /// Collapses the three wire flags into one state. More than one flag set
    /// has no meaning and yields `None`.
    pub fn from_flags(is_connected: bool, incoming: bool, outgoing: bool) -> Option<Self> {
        match (is_connected, incoming, outgoing) {
            (false, false, false) => Some(RelationshipView::None),
            (true, false, false) => Some(RelationshipView::Connected),
            (false, true, false) => Some(RelationshipView::IncomingPending),
            (false, false, true) => Some(RelationshipView::OutgoingPending),
            _ => None,
        }
    }

    pub fn available_actions(&self) -> &'static [Action] {
        match self {
            RelationshipView::None => &[Action::Connect],
            RelationshipView::OutgoingPending => &[Action::Cancel],
            RelationshipView::IncomingPending => &[Action::Accept, Action::Reject],
            RelationshipView::Connected => &[Action::Remove],
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        self.available_actions().contains(&action)
    }

    pub fn apply(self, action: Action) -> Result<RelationshipView, TransitionError> {
        match (self, action) {
            (RelationshipView::None, Action::Connect) => Ok(RelationshipView::OutgoingPending),
            (RelationshipView::OutgoingPending, Action::Cancel) => Ok(RelationshipView::None),
            (RelationshipView::IncomingPending, Action::Accept) => Ok(RelationshipView::Connected),
            (RelationshipView::IncomingPending, Action::Reject) => Ok(RelationshipView::None),
            (RelationshipView::Connected, Action::Remove) => Ok(RelationshipView::None),
            (from, Action::Connect) => Err(TransitionError { kind: TransitionErrorKind::Conflict, action, from }),
            (from, action) => Err(TransitionError { kind: TransitionErrorKind::NotFound, action, from }),
        }
    }

    /// The same relationship seen from the other user's side.
    pub fn mirrored(self) -> RelationshipView {
        match self {
            RelationshipView::IncomingPending => RelationshipView::OutgoingPending,
            RelationshipView::OutgoingPending => RelationshipView::IncomingPending,
            other => other,
        }
    }
}

impl fmt::Display for RelationshipView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationshipView::None => "not connected",
            RelationshipView::Connected => "connected",
            RelationshipView::IncomingPending => "awaiting your answer",
            RelationshipView::OutgoingPending => "awaiting their answer",
        })
    }
}

const AFTER_REQUEST_CHANGE: &[QueryKey] = &[QueryKey::NetworkUsers, QueryKey::PendingRequests(Direction::Incoming)];
const AFTER_DELETE: &[QueryKey] = &[
    QueryKey::NetworkUsers,
    QueryKey::PendingRequests(Direction::Incoming),
    QueryKey::PendingRequests(Direction::Outgoing),
];

impl Action {
    pub const ALL: [Action; 5] = [Action::Connect, Action::Cancel, Action::Accept, Action::Reject, Action::Remove];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Connect => "connect",
            Action::Cancel => "cancel",
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Remove => "remove",
        }
    }

    /// Cache keys a successful run of this action leaves stale. `Cancel` and
    /// `Remove` share one remote delete and therefore one key set.
    pub fn invalidates(&self) -> &'static [QueryKey] {
        match self {
            Action::Connect | Action::Accept | Action::Reject => AFTER_REQUEST_CHANGE,
            Action::Cancel | Action::Remove => AFTER_DELETE,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATES: [RelationshipView; 4] = [
        RelationshipView::None,
        RelationshipView::Connected,
        RelationshipView::IncomingPending,
        RelationshipView::OutgoingPending,
    ];

    #[test]
    fn each_state_has_its_own_action_row() {
        assert_eq!(RelationshipView::None.available_actions(), &[Action::Connect]);
        assert_eq!(RelationshipView::OutgoingPending.available_actions(), &[Action::Cancel]);
        assert_eq!(RelationshipView::IncomingPending.available_actions(), &[Action::Accept, Action::Reject]);
        assert_eq!(RelationshipView::Connected.available_actions(), &[Action::Remove]);
    }

    #[test]
    fn legal_actions_land_in_table_state() {
        assert_eq!(RelationshipView::None.apply(Action::Connect), Ok(RelationshipView::OutgoingPending));
        assert_eq!(RelationshipView::OutgoingPending.apply(Action::Cancel), Ok(RelationshipView::None));
        assert_eq!(RelationshipView::IncomingPending.apply(Action::Accept), Ok(RelationshipView::Connected));
        assert_eq!(RelationshipView::IncomingPending.apply(Action::Reject), Ok(RelationshipView::None));
        assert_eq!(RelationshipView::Connected.apply(Action::Remove), Ok(RelationshipView::None));
    }

    #[test]
    fn every_illegal_pair_fails() {
        for state in STATES {
            for action in Action::ALL {
                let result = state.apply(action);
                assert_eq!(result.is_ok(), state.allows(action), "{state:?} / {action:?}");
                if let Err(err) = result {
                    let expected = if action == Action::Connect { TransitionErrorKind::Conflict } else { TransitionErrorKind::NotFound };
                    assert_eq!(err.kind, expected);
                    assert_eq!(err.from, state);
                }
            }
        }
    }

    #[test]
    fn accept_then_remove_is_back_to_none() {
        let state = RelationshipView::IncomingPending
            .apply(Action::Accept)
            .and_then(|s| s.apply(Action::Remove));
        assert_eq!(state, Ok(RelationshipView::None));
    }

    #[test]
    fn flags_decode_exclusively() {
        assert_eq!(RelationshipView::from_flags(false, false, false), Some(RelationshipView::None));
        assert_eq!(RelationshipView::from_flags(true, false, false), Some(RelationshipView::Connected));
        assert_eq!(RelationshipView::from_flags(false, true, false), Some(RelationshipView::IncomingPending));
        assert_eq!(RelationshipView::from_flags(false, false, true), Some(RelationshipView::OutgoingPending));
        assert_eq!(RelationshipView::from_flags(true, true, false), None);
        assert_eq!(RelationshipView::from_flags(false, true, true), None);
        assert_eq!(RelationshipView::from_flags(true, true, true), None);
    }

    #[test]
    fn mirrored_swaps_pending_sides() {
        for state in STATES {
            assert_eq!(state.mirrored().mirrored(), state);
        }
        assert_eq!(RelationshipView::OutgoingPending.mirrored(), RelationshipView::IncomingPending);
        assert_eq!(RelationshipView::Connected.mirrored(), RelationshipView::Connected);
    }

    #[test]
    fn invalidation_sets_per_action() {
        let incoming = QueryKey::PendingRequests(Direction::Incoming);
        let outgoing = QueryKey::PendingRequests(Direction::Outgoing);
        for action in [Action::Connect, Action::Accept, Action::Reject] {
            assert_eq!(action.invalidates(), &[QueryKey::NetworkUsers, incoming]);
        }
        for action in [Action::Cancel, Action::Remove] {
            assert_eq!(action.invalidates(), &[QueryKey::NetworkUsers, incoming, outgoing]);
        }
    }
}
