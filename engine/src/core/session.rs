//! Session phase machine.
//!
//! Phases are never persisted. Each invocation observes the repository (lock
//! and completion marker) to find its starting phase and then drives the
//! machine through the events of one operation. An event that has no edge from
//! the current phase is rejected with [`IllegalTransition`].

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Opening,
    /// A stale lock was reclaimed; the session proceeds to `Open`.
    Recovering,
    Open,
    Closing,
    Closed,
    Aborted,
    /// Terminal: the completion marker exists.
    Sealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Begin,
    KillRequested,
    LockConflict,
    StaleLockReclaimed,
    LockAcquired,
    CloseRequested,
    Persisted,
    Seal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal session transition: {event:?} while {from:?}")]
pub struct IllegalTransition {
    pub from: SessionPhase,
    pub event: SessionEvent,
}

impl SessionPhase {
    /// Starting phase derived from what is on disk.
    pub fn observe(lock_held: bool, sealed: bool) -> Self {
        if sealed {
            Self::Sealed
        } else if lock_held {
            Self::Open
        } else {
            Self::Idle
        }
    }

    pub fn on(self, event: SessionEvent) -> Result<Self, IllegalTransition> {
        use SessionEvent as E;
        use SessionPhase as P;

        let next = match (self, event) {
            (P::Idle | P::Closed | P::Aborted, E::Begin) => P::Opening,
            // A held lock is also a starting point for open: it is either live
            // (conflict) or stale (reclaimed).
            (P::Open, E::Begin) => P::Opening,
            (P::Opening, E::KillRequested | E::LockConflict) => P::Aborted,
            (P::Opening, E::StaleLockReclaimed) => P::Recovering,
            (P::Opening | P::Recovering, E::LockAcquired) => P::Open,
            (P::Open, E::CloseRequested) => P::Closing,
            (P::Closing, E::Persisted) => P::Closed,
            (P::Idle | P::Open | P::Closed, E::Seal) => P::Sealed,
            (from, event) => return Err(IllegalTransition { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(
        start: SessionPhase,
        events: &[SessionEvent],
    ) -> Result<SessionPhase, IllegalTransition> {
        events.iter().try_fold(start, |phase, event| phase.on(*event))
    }

    #[test]
    fn open_then_close_reaches_closed() {
        let phase = drive(
            SessionPhase::Idle,
            &[
                SessionEvent::Begin,
                SessionEvent::LockAcquired,
                SessionEvent::CloseRequested,
                SessionEvent::Persisted,
            ],
        );
        assert_eq!(phase, Ok(SessionPhase::Closed));
    }

    #[test]
    fn stale_lock_goes_through_recovering() {
        let phase = SessionPhase::Open
            .on(SessionEvent::Begin)
            .and_then(|p| p.on(SessionEvent::StaleLockReclaimed));
        assert_eq!(phase, Ok(SessionPhase::Recovering));
        assert_eq!(
            phase.and_then(|p| p.on(SessionEvent::LockAcquired)),
            Ok(SessionPhase::Open)
        );
    }

    #[test]
    fn kill_and_conflict_abort_opening() {
        for event in [SessionEvent::KillRequested, SessionEvent::LockConflict] {
            assert_eq!(SessionPhase::Opening.on(event), Ok(SessionPhase::Aborted));
        }
    }

    #[test]
    fn close_without_open_is_rejected() {
        let err = SessionPhase::Idle
            .on(SessionEvent::CloseRequested)
            .expect_err("idle cannot close");
        assert_eq!(err.from, SessionPhase::Idle);
    }

    #[test]
    fn sealed_accepts_nothing() {
        let sealed = SessionPhase::observe(true, true);
        assert_eq!(sealed, SessionPhase::Sealed);
        for event in [
            SessionEvent::Begin,
            SessionEvent::CloseRequested,
            SessionEvent::Seal,
        ] {
            assert!(sealed.on(event).is_err());
        }
    }
}
