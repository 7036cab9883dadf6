//! Client-side reconciliation of broadcast state.
//!
//! Every client holds a local copy of the room state that is refreshed from
//! `STATE_SYNC` broadcasts. The host runs ahead of the authoritative copy while
//! it drives the game, so merging is asymmetric: guests always adopt the
//! broadcast, the host drops broadcasts that lag behind its own progress.

use std::time::Duration;

use crate::state::{game::GameState, phase::GamePhase};

/// Trust role of a client when merging broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The driving client; its speculative progress must not be rolled back.
    Host,
    /// Any other client; the broadcast is always authoritative for it.
    Guest,
}

/// What the caller should do with a merged broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Broadcast adopted.
    Accepted,
    /// Broadcast adopted and the game just reached its terminal phase; the
    /// caller should hold the final frame for `settle` (see
    /// [`ClientView::settle_ending`]) before redirecting away.
    AcceptedEnding {
        /// How long to keep rendering the final state before the redirect.
        settle: Duration,
    },
    /// Broadcast lagged behind the host's local progress and was dropped.
    DroppedStale,
}

/// A client's local view of the room state.
#[derive(Debug, Clone)]
pub struct ClientView {
    role: Role,
    ending_settle: Duration,
    /// Local copy of the room state, possibly ahead of the authoritative one
    /// on the host.
    pub state: GameState,
}

impl ClientView {
    /// Start a view from the first snapshot received on connect.
    ///
    /// `ending_settle` is how long the view lingers on the final state once
    /// the game ends, usually `AppConfig::ending_settle_delay`.
    pub fn new(role: Role, initial: GameState, ending_settle: Duration) -> Self {
        Self {
            role,
            ending_settle,
            state: initial,
        }
    }

    /// Trust role of this view.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Merge one broadcast under the asymmetric acceptance rules.
    ///
    /// Progress is compared as `(round, phase rank)` so that looping back to
    /// the talk phase in a later round still counts as forward movement.
    pub fn merge(&mut self, incoming: GameState) -> MergeOutcome {
        if self.role == Role::Host {
            let local = (self.state.round, self.state.phase.rank());
            let broadcast = (incoming.round, incoming.phase.rank());
            if broadcast < local {
                return MergeOutcome::DroppedStale;
            }
        }

        let newly_ended =
            incoming.phase == GamePhase::Ended && self.state.phase != GamePhase::Ended;
        self.state = incoming;

        if newly_ended {
            MergeOutcome::AcceptedEnding {
                settle: self.ending_settle,
            }
        } else {
            MergeOutcome::Accepted
        }
    }

    /// Hold the final frame for the configured settle delay. Called after a
    /// merge returns [`MergeOutcome::AcceptedEnding`], before the client
    /// navigates off the ended screen.
    pub async fn settle_ending(&self) {
        tokio::time::sleep(self.ending_settle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::phase::GamePhase;

    const SETTLE: Duration = Duration::from_millis(1500);

    fn state_at(round: u32, phase: GamePhase) -> GameState {
        let mut state = GameState::new(6);
        state.round = round;
        state.phase = phase;
        state
    }

    fn view(role: Role, state: GameState) -> ClientView {
        ClientView::new(role, state, SETTLE)
    }

    #[test]
    fn host_drops_stale_phase_broadcast() {
        // Host is three phases ahead; an earlier broadcast arrives late.
        let mut view = view(Role::Host, state_at(1, GamePhase::RoundTalk));
        view.state.phase = GamePhase::RoundResolve;

        let outcome = view.merge(state_at(1, GamePhase::StartingStats));
        assert_eq!(outcome, MergeOutcome::DroppedStale);
        assert_eq!(view.state.phase, GamePhase::RoundResolve);
    }

    #[test]
    fn guest_always_adopts_the_broadcast() {
        let mut view = view(Role::Guest, state_at(1, GamePhase::RoundResolve));
        let outcome = view.merge(state_at(1, GamePhase::StartingStats));
        assert_eq!(outcome, MergeOutcome::Accepted);
        assert_eq!(view.state.phase, GamePhase::StartingStats);
    }

    #[test]
    fn host_accepts_equal_or_newer_progress() {
        let mut view = view(Role::Host, state_at(2, GamePhase::AnswerSelection));

        let mut same = state_at(2, GamePhase::AnswerSelection);
        same.compatibility = 80;
        assert_eq!(view.merge(same), MergeOutcome::Accepted);
        assert_eq!(view.state.compatibility, 80);

        assert_eq!(
            view.merge(state_at(2, GamePhase::RoundResolve)),
            MergeOutcome::Accepted
        );
    }

    #[test]
    fn later_round_outranks_earlier_phase() {
        // RoundTalk has a lower rank than RoundResolve, but a higher round
        // wins: the loop back to the talk phase is forward progress.
        let mut view = view(Role::Host, state_at(2, GamePhase::RoundResolve));
        assert_eq!(
            view.merge(state_at(3, GamePhase::RoundTalk)),
            MergeOutcome::Accepted
        );
        assert_eq!(view.state.round, 3);
    }

    #[test]
    fn ending_is_flagged_for_deferred_redirect() {
        let mut view = view(Role::Guest, state_at(6, GamePhase::RoundResolve));
        assert_eq!(
            view.merge(state_at(6, GamePhase::Ended)),
            MergeOutcome::AcceptedEnding { settle: SETTLE }
        );
        // Repeated terminal broadcasts do not re-trigger the redirect.
        assert_eq!(
            view.merge(state_at(6, GamePhase::Ended)),
            MergeOutcome::Accepted
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ending_holds_the_final_frame_for_the_configured_delay() {
        let delay = crate::config::AppConfig::default().ending_settle_delay;
        let mut view = ClientView::new(Role::Guest, state_at(6, GamePhase::RoundResolve), delay);

        let outcome = view.merge(state_at(6, GamePhase::Ended));
        assert_eq!(outcome, MergeOutcome::AcceptedEnding { settle: delay });

        let before = tokio::time::Instant::now();
        view.settle_ending().await;
        assert!(before.elapsed() >= delay);
    }
}
