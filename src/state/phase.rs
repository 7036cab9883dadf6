//! Game phases, their forward-only ordering, and the round plan that decides
//! which kind of round a given round number is.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// High-level phases a room can be in, in forward order.
///
/// The only legal backward movement is the per-round loop handled by the
/// `NEXT_ROUND` action, which bumps the round counter at the same time; within
/// a single round the phase rank never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum GamePhase {
    /// Players gather and the host configures the game.
    #[serde(rename = "lobby")]
    Lobby,
    /// Optional guided walkthrough before the first round.
    #[serde(rename = "tutorial")]
    Tutorial,
    /// Pre-game Q&A that assembles the shared date avatar from player answers.
    #[serde(rename = "starting-stats")]
    StartingStats,
    /// The avatar reacts to the freshly assembled starting stats.
    #[serde(rename = "reaction")]
    Reaction,
    /// Players read the round prompt and submit free-text answers.
    #[serde(rename = "phase1")]
    RoundTalk,
    /// Submitted answers are grouped and the selection wheel runs.
    #[serde(rename = "answer-selection")]
    AnswerSelection,
    /// The avatar reacts to the winning answer and the round resolves.
    #[serde(rename = "phase3")]
    RoundResolve,
    /// The one-time special round inserted at a fixed point in the sequence.
    #[serde(rename = "plot-twist")]
    PlotTwist,
    /// The avatar reacts to the plot twist.
    #[serde(rename = "plot-twist-reaction")]
    PlotTwistReaction,
    /// Terminal state; only an external reset recreates the engine.
    #[serde(rename = "ended")]
    Ended,
}

impl GamePhase {
    /// Position of this phase in the forward ordering.
    ///
    /// Used by the client-side merge rule to decide whether a broadcast is
    /// stale relative to the host's local progress.
    pub fn rank(self) -> u8 {
        match self {
            GamePhase::Lobby => 0,
            GamePhase::Tutorial => 1,
            GamePhase::StartingStats => 2,
            GamePhase::Reaction => 3,
            GamePhase::RoundTalk => 4,
            GamePhase::AnswerSelection => 5,
            GamePhase::RoundResolve => 6,
            GamePhase::PlotTwist => 7,
            GamePhase::PlotTwistReaction => 8,
            GamePhase::Ended => 9,
        }
    }

    /// Whether the game has reached its terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, GamePhase::Ended)
    }
}

/// What a given round number holds for the players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// Ordinary prompt / answers / wheel / reaction round.
    Question,
    /// The one-time special round.
    PlotTwist,
    /// Scripted two-line closing conversation, after which the game ends.
    WrapUp,
}

/// The round at which the plot twist diverts the ordinary flow, i.e. the round
/// entered when the counter moves from 2 to 3.
const PLOT_TWIST_ROUND: u32 = 3;
/// Plot twist only makes sense when there is room for it plus a wrap-up.
const PLOT_TWIST_MIN_BUDGET: u32 = 4;

/// Single source of truth for the round-budget arithmetic.
///
/// Every question of the form "what does round N mean" is answered here so the
/// phase labels shown to players, the plot-twist trigger, and the wrap-up
/// detection can never drift apart.
#[derive(Debug, Clone, Copy)]
pub struct RoundPlan {
    max_rounds: u32,
}

impl RoundPlan {
    /// Build a plan for the given total round budget (minimum 2).
    pub fn new(max_rounds: u32) -> Self {
        Self {
            max_rounds: max_rounds.max(2),
        }
    }

    /// Total round budget.
    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// Classify a 1-based round number.
    ///
    /// `plot_twist_completed` guards the special round so it cannot re-trigger
    /// when a game is restored mid-flight from a snapshot.
    pub fn kind_of(&self, round: u32, plot_twist_completed: bool) -> RoundKind {
        if round >= self.max_rounds {
            RoundKind::WrapUp
        } else if round == PLOT_TWIST_ROUND
            && !plot_twist_completed
            && self.max_rounds >= PLOT_TWIST_MIN_BUDGET
        {
            RoundKind::PlotTwist
        } else {
            RoundKind::Question
        }
    }

    /// Whether another round exists after `round`.
    pub fn has_next(&self, round: u32) -> bool {
        round < self.max_rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ranks_are_strictly_increasing() {
        let order = [
            GamePhase::Lobby,
            GamePhase::Tutorial,
            GamePhase::StartingStats,
            GamePhase::Reaction,
            GamePhase::RoundTalk,
            GamePhase::AnswerSelection,
            GamePhase::RoundResolve,
            GamePhase::PlotTwist,
            GamePhase::PlotTwistReaction,
            GamePhase::Ended,
        ];
        for pair in order.windows(2) {
            assert!(pair[0].rank() < pair[1].rank(), "{pair:?}");
        }
    }

    #[test]
    fn plot_twist_fires_entering_round_three() {
        let plan = RoundPlan::new(6);
        assert_eq!(plan.kind_of(1, false), RoundKind::Question);
        assert_eq!(plan.kind_of(2, false), RoundKind::Question);
        assert_eq!(plan.kind_of(3, false), RoundKind::PlotTwist);
        assert_eq!(plan.kind_of(4, true), RoundKind::Question);
        assert_eq!(plan.kind_of(5, true), RoundKind::Question);
        assert_eq!(plan.kind_of(6, true), RoundKind::WrapUp);
    }

    #[test]
    fn plot_twist_fires_at_the_same_round_for_any_budget() {
        for budget in 4..=12 {
            let plan = RoundPlan::new(budget);
            assert_eq!(plan.kind_of(3, false), RoundKind::PlotTwist, "budget {budget}");
            assert_eq!(plan.kind_of(2, false), RoundKind::Question, "budget {budget}");
        }
    }

    #[test]
    fn plot_twist_cannot_retrigger() {
        let plan = RoundPlan::new(6);
        assert_eq!(plan.kind_of(3, true), RoundKind::Question);
    }

    #[test]
    fn short_budgets_skip_the_plot_twist() {
        let plan = RoundPlan::new(3);
        assert_eq!(plan.kind_of(3, false), RoundKind::WrapUp);
    }

    #[test]
    fn wire_names_round_trip() {
        let json = serde_json::to_string(&GamePhase::RoundTalk).unwrap();
        assert_eq!(json, "\"phase1\"");
        let back: GamePhase = serde_json::from_str("\"plot-twist-reaction\"").unwrap();
        assert_eq!(back, GamePhase::PlotTwistReaction);
    }
}
