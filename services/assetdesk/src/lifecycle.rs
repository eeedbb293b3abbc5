//! Assignment and returning-request state machines.
//!
//! # Purpose
//! Holds the allowed transitions as plain tables and exposes one lookup per
//! machine. Every mutating store operation runs its guard through here, so the
//! rules live in exactly one place.
//!
//! # Key invariants
//! - A transition either matches one row and yields the next state, or fails
//!   with [`InvalidTransition`] and the caller writes nothing.
//! - `asset` on a row is the state the coupled asset moves to, when any.
use crate::model::{AssetState, AssignmentState, ReturningState};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentEvent {
    Accept,
    Decline,
    Edit,
    Delete,
    RequestReturn,
    CompleteReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturningEvent {
    Cancel,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule<S, E> {
    pub from: S,
    pub event: E,
    pub to: S,
    pub asset: Option<AssetState>,
}

pub type AssignmentRule = Rule<AssignmentState, AssignmentEvent>;
pub type ReturningRule = Rule<ReturningState, ReturningEvent>;

pub const ASSIGNMENT_TRANSITIONS: &[AssignmentRule] = &[
    Rule {
        from: AssignmentState::WaitingForAcceptance,
        event: AssignmentEvent::Accept,
        to: AssignmentState::Accepted,
        asset: Some(AssetState::Assigned),
    },
    Rule {
        from: AssignmentState::WaitingForAcceptance,
        event: AssignmentEvent::Decline,
        to: AssignmentState::Declined,
        asset: Some(AssetState::Available),
    },
    Rule {
        from: AssignmentState::WaitingForAcceptance,
        event: AssignmentEvent::Edit,
        to: AssignmentState::WaitingForAcceptance,
        asset: None,
    },
    // The asset was reserved when the assignment was created.
    Rule {
        from: AssignmentState::WaitingForAcceptance,
        event: AssignmentEvent::Delete,
        to: AssignmentState::WaitingForAcceptance,
        asset: Some(AssetState::Available),
    },
    Rule {
        from: AssignmentState::Declined,
        event: AssignmentEvent::Delete,
        to: AssignmentState::Declined,
        asset: None,
    },
    Rule {
        from: AssignmentState::Accepted,
        event: AssignmentEvent::RequestReturn,
        to: AssignmentState::Accepted,
        asset: None,
    },
    Rule {
        from: AssignmentState::Accepted,
        event: AssignmentEvent::CompleteReturn,
        to: AssignmentState::Returned,
        asset: Some(AssetState::Available),
    },
];

pub const RETURNING_TRANSITIONS: &[ReturningRule] = &[
    Rule {
        from: ReturningState::WaitingForReturning,
        event: ReturningEvent::Cancel,
        to: ReturningState::Cancelled,
        asset: None,
    },
    Rule {
        from: ReturningState::WaitingForReturning,
        event: ReturningEvent::Complete,
        to: ReturningState::Completed,
        asset: Some(AssetState::Available),
    },
];

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot {event} {entity} in state {state}")]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub state: String,
    pub event: String,
}

fn lookup<S, E>(table: &'static [Rule<S, E>], state: S, event: E) -> Option<&'static Rule<S, E>>
where
    S: Copy + PartialEq + 'static,
    E: Copy + PartialEq + 'static,
{
    table
        .iter()
        .find(|rule| rule.from == state && rule.event == event)
}

pub fn assignment_transition(
    state: AssignmentState,
    event: AssignmentEvent,
) -> Result<&'static AssignmentRule, InvalidTransition> {
    lookup(ASSIGNMENT_TRANSITIONS, state, event).ok_or_else(|| InvalidTransition {
        entity: "assignment",
        state: format!("{state:?}"),
        event: format!("{event:?}").to_lowercase(),
    })
}

pub fn returning_transition(
    state: ReturningState,
    event: ReturningEvent,
) -> Result<&'static ReturningRule, InvalidTransition> {
    lookup(RETURNING_TRANSITIONS, state, event).ok_or_else(|| InvalidTransition {
        entity: "returning request",
        state: format!("{state:?}"),
        event: format!("{event:?}").to_lowercase(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_only_from_waiting() {
        let rule = assignment_transition(
            AssignmentState::WaitingForAcceptance,
            AssignmentEvent::Accept,
        )
        .expect("accept");
        assert_eq!(rule.to, AssignmentState::Accepted);
        assert_eq!(rule.asset, Some(AssetState::Assigned));

        let err = assignment_transition(AssignmentState::Declined, AssignmentEvent::Accept)
            .expect_err("declined cannot be accepted");
        assert_eq!(err.entity, "assignment");
        assert_eq!(err.state, "Declined");
        assert_eq!(err.to_string(), "cannot accept assignment in state Declined");
    }

    #[test]
    fn decline_releases_asset() {
        let rule = assignment_transition(
            AssignmentState::WaitingForAcceptance,
            AssignmentEvent::Decline,
        )
        .expect("decline");
        assert_eq!(rule.to, AssignmentState::Declined);
        assert_eq!(rule.asset, Some(AssetState::Available));
    }

    #[test]
    fn deletable_states() {
        assert!(
            assignment_transition(
                AssignmentState::WaitingForAcceptance,
                AssignmentEvent::Delete
            )
            .is_ok()
        );
        assert!(assignment_transition(AssignmentState::Declined, AssignmentEvent::Delete).is_ok());
        assert!(assignment_transition(AssignmentState::Accepted, AssignmentEvent::Delete).is_err());
        assert!(assignment_transition(AssignmentState::Returned, AssignmentEvent::Delete).is_err());
    }

    #[test]
    fn edit_keeps_state_and_requires_waiting() {
        let rule = assignment_transition(
            AssignmentState::WaitingForAcceptance,
            AssignmentEvent::Edit,
        )
        .expect("edit");
        assert_eq!(rule.to, AssignmentState::WaitingForAcceptance);
        assert!(assignment_transition(AssignmentState::Accepted, AssignmentEvent::Edit).is_err());
    }

    #[test]
    fn return_flow_requires_accepted() {
        assert!(
            assignment_transition(AssignmentState::Accepted, AssignmentEvent::RequestReturn)
                .is_ok()
        );
        assert!(
            assignment_transition(
                AssignmentState::WaitingForAcceptance,
                AssignmentEvent::RequestReturn
            )
            .is_err()
        );
        let rule = assignment_transition(AssignmentState::Accepted, AssignmentEvent::CompleteReturn)
            .expect("complete");
        assert_eq!(rule.to, AssignmentState::Returned);
        assert_eq!(rule.asset, Some(AssetState::Available));
    }

    #[test]
    fn returning_request_terminal_states() {
        let rule = returning_transition(ReturningState::WaitingForReturning, ReturningEvent::Cancel)
            .expect("cancel");
        assert_eq!(rule.to, ReturningState::Cancelled);
        let rule =
            returning_transition(ReturningState::WaitingForReturning, ReturningEvent::Complete)
                .expect("complete");
        assert_eq!(rule.to, ReturningState::Completed);

        for state in [ReturningState::Completed, ReturningState::Cancelled] {
            assert!(returning_transition(state, ReturningEvent::Cancel).is_err());
            assert!(returning_transition(state, ReturningEvent::Complete).is_err());
        }
    }

    #[test]
    fn table_has_no_duplicate_rows() {
        for (i, a) in ASSIGNMENT_TRANSITIONS.iter().enumerate() {
            for b in &ASSIGNMENT_TRANSITIONS[i + 1..] {
                assert!(!(a.from == b.from && a.event == b.event));
            }
        }
    }
}
