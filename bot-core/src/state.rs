//! Sync/dispatch loop state machine for capybot.
//!
//! This module provides a pure, side-effect-free state machine for the
//! bot's main loop. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (logging in, syncing, publishing, persisting) is performed
//! by capybot-client, not by this module. This enables instant unit testing
//! without network mocks.
//!
//! ```text
//! Authenticating ──LoginSucceeded──► WaitingOnSync ──SyncReturned──► Dispatching
//!       ▲                              ▲      │                          │
//!       │                              │      └─SyncFailed (pause)─┐     │
//!       └──────── SessionLost ─────────┤◄─────────────────────────┘     ▼
//!                                      └────── PersistFinished ◄── Persisting
//! ```

/// Loop state machine - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopState {
    /// No valid session; logging in.
    Authenticating,
    /// Running: scheduler checked, blocked on a bounded sync.
    WaitingOnSync,
    /// Running: classifying the target room's events from the last batch.
    Dispatching,
    /// Running: writing the advanced cursor.
    Persisting,
    /// Terminal: login failed, the process should exit.
    Stopped {
        /// Why the loop stopped.
        reason: String,
    },
}

impl LoopState {
    /// Create a new state machine in the Authenticating state.
    pub fn new() -> Self {
        Self::Authenticating
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (capybot-client)
    /// is responsible for executing the returned actions in order.
    pub fn on_event(self, event: LoopEvent) -> (Self, Vec<LoopAction>) {
        match (self, event) {
            // From Authenticating
            (Self::Authenticating, LoopEvent::Start) => {
                (Self::Authenticating, vec![LoopAction::Login])
            }
            (Self::Authenticating, LoopEvent::LoginSucceeded) => (
                Self::WaitingOnSync,
                vec![
                    LoopAction::JoinRoom,
                    LoopAction::RunScheduler,
                    LoopAction::Sync,
                ],
            ),
            (Self::Authenticating, LoopEvent::LoginFailed { reason }) => (
                Self::Stopped {
                    reason: reason.clone(),
                },
                vec![LoopAction::Exit { reason }],
            ),

            // From WaitingOnSync
            (Self::WaitingOnSync, LoopEvent::SyncReturned) => {
                (Self::Dispatching, vec![LoopAction::Dispatch])
            }
            (Self::WaitingOnSync, LoopEvent::SyncFailed { .. }) => (
                Self::WaitingOnSync,
                vec![
                    LoopAction::Pause,
                    LoopAction::RunScheduler,
                    LoopAction::Sync,
                ],
            ),

            // From Dispatching
            (Self::Dispatching, LoopEvent::DispatchFinished) => {
                (Self::Persisting, vec![LoopAction::Persist])
            }

            // From Persisting
            (Self::Persisting, LoopEvent::PersistFinished) => (
                Self::WaitingOnSync,
                vec![LoopAction::RunScheduler, LoopAction::Sync],
            ),

            // Session loss from any running state
            (state, LoopEvent::SessionLost { .. }) if state.is_running() => {
                (Self::Authenticating, vec![LoopAction::Login])
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if the loop holds a valid session.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::WaitingOnSync | Self::Dispatching | Self::Persisting
        )
    }

    /// Check if the loop has stopped for good.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

/// Events that can occur in the loop lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Process started.
    Start,
    /// Homeserver accepted the credentials.
    LoginSucceeded,
    /// Login was rejected or could not be attempted.
    LoginFailed {
        /// Error message describing the failure.
        reason: String,
    },
    /// A sync step returned (with data or on timeout).
    SyncReturned,
    /// A sync step failed transiently.
    SyncFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// The homeserver no longer accepts the session.
    SessionLost {
        /// Error message describing the failure.
        reason: String,
    },
    /// All events of the batch were dispatched.
    DispatchFinished,
    /// The cursor write finished (successfully or not).
    PersistFinished,
}

/// Actions to be executed by capybot-client.
///
/// These are instructions, not side effects. The bot driver interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopAction {
    /// Log in with the configured credentials.
    Login,
    /// Join the target room (best effort).
    JoinRoom,
    /// Poll the scheduler and run the daily publish if it is due.
    RunScheduler,
    /// Perform one bounded-wait sync step.
    Sync,
    /// Classify the target room's events and forward votes.
    Dispatch,
    /// Write the cursor.
    Persist,
    /// Wait the configured retry delay before the next sync.
    Pause,
    /// Stop the process.
    Exit {
        /// Why the process stops.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_authenticating() {
        let state = LoopState::new();
        assert!(matches!(state, LoopState::Authenticating));
        assert!(!state.is_running());
    }

    #[test]
    fn start_requests_login() {
        let (state, actions) = LoopState::new().on_event(LoopEvent::Start);
        assert_eq!(state, LoopState::Authenticating);
        assert_eq!(actions, vec![LoopAction::Login]);
    }

    #[test]
    fn login_success_joins_then_checks_scheduler_then_syncs() {
        let (state, actions) = LoopState::Authenticating.on_event(LoopEvent::LoginSucceeded);

        assert_eq!(state, LoopState::WaitingOnSync);
        assert_eq!(
            actions,
            vec![
                LoopAction::JoinRoom,
                LoopAction::RunScheduler,
                LoopAction::Sync
            ]
        );
    }

    #[test]
    fn login_failure_stops() {
        let (state, actions) = LoopState::Authenticating.on_event(LoopEvent::LoginFailed {
            reason: "M_FORBIDDEN".into(),
        });

        assert!(state.is_stopped());
        assert!(actions
            .iter()
            .any(|a| matches!(a, LoopAction::Exit { reason } if reason == "M_FORBIDDEN")));
    }

    #[test]
    fn full_iteration_cycles_back_to_waiting() {
        let (state, actions) = LoopState::WaitingOnSync.on_event(LoopEvent::SyncReturned);
        assert_eq!(state, LoopState::Dispatching);
        assert_eq!(actions, vec![LoopAction::Dispatch]);

        let (state, actions) = state.on_event(LoopEvent::DispatchFinished);
        assert_eq!(state, LoopState::Persisting);
        assert_eq!(actions, vec![LoopAction::Persist]);

        let (state, actions) = state.on_event(LoopEvent::PersistFinished);
        assert_eq!(state, LoopState::WaitingOnSync);
        assert_eq!(actions, vec![LoopAction::RunScheduler, LoopAction::Sync]);
    }

    #[test]
    fn sync_failure_pauses_and_retries() {
        let (state, actions) = LoopState::WaitingOnSync.on_event(LoopEvent::SyncFailed {
            error: "timeout".into(),
        });

        assert_eq!(state, LoopState::WaitingOnSync);
        assert_eq!(
            actions,
            vec![LoopAction::Pause, LoopAction::RunScheduler, LoopAction::Sync]
        );
    }

    #[test]
    fn session_loss_reauthenticates_from_any_running_state() {
        for state in [
            LoopState::WaitingOnSync,
            LoopState::Dispatching,
            LoopState::Persisting,
        ] {
            let (next, actions) = state.on_event(LoopEvent::SessionLost {
                reason: "M_UNKNOWN_TOKEN".into(),
            });
            assert_eq!(next, LoopState::Authenticating);
            assert_eq!(actions, vec![LoopAction::Login]);
        }
    }

    #[test]
    fn session_loss_while_authenticating_is_ignored() {
        let (state, actions) = LoopState::Authenticating.on_event(LoopEvent::SessionLost {
            reason: "x".into(),
        });
        assert_eq!(state, LoopState::Authenticating);
        assert!(actions.is_empty());
    }

    #[test]
    fn never_syncs_without_session() {
        // Sync results arriving while authenticating must not advance the loop.
        let (state, actions) = LoopState::Authenticating.on_event(LoopEvent::SyncReturned);
        assert_eq!(state, LoopState::Authenticating);
        assert!(actions.is_empty());
    }

    #[test]
    fn stopped_is_terminal() {
        let stopped = LoopState::Stopped {
            reason: "bad password".into(),
        };
        for event in [
            LoopEvent::Start,
            LoopEvent::LoginSucceeded,
            LoopEvent::SyncReturned,
            LoopEvent::PersistFinished,
        ] {
            let (state, actions) = stopped.clone().on_event(event);
            assert!(state.is_stopped());
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn out_of_order_events_are_ignored() {
        let (state, actions) = LoopState::Dispatching.on_event(LoopEvent::PersistFinished);
        assert_eq!(state, LoopState::Dispatching);
        assert!(actions.is_empty());

        let (state, actions) = LoopState::Persisting.on_event(LoopEvent::SyncReturned);
        assert_eq!(state, LoopState::Persisting);
        assert!(actions.is_empty());
    }

    #[test]
    fn is_running_helper() {
        assert!(!LoopState::Authenticating.is_running());
        assert!(LoopState::WaitingOnSync.is_running());
        assert!(LoopState::Dispatching.is_running());
        assert!(LoopState::Persisting.is_running());
        assert!(!LoopState::Stopped { reason: "x".into() }.is_running());
    }
}
