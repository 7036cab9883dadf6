//! The closed action vocabulary and the pure reducer applied by the room actor.
//!
//! Every mutation of a room's [`GameState`] goes through [`apply`]. Unknown,
//! malformed, out-of-phase, and unauthorized actions are silent no-ops so a
//! misbehaving client can never crash or wedge a room.

use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    game::{ChatMessage, GameState, RoundAnswer, StartingStatsState, StatCategory, WheelPhase, WheelSlice, WheelState},
    phase::{GamePhase, RoundKind, RoundPlan},
};

/// Question slots used to assemble the avatar during starting stats.
pub const STARTING_STAT_SLOTS: &[(StatCategory, &str)] = &[
    (StatCategory::Name, "What's your date's name?"),
    (StatCategory::Physical, "What's the first thing you notice about them?"),
    (StatCategory::Emotional, "What are they secretly afraid of?"),
    (StatCategory::Physical, "What did they wear tonight?"),
    (StatCategory::Emotional, "What do they want most out of life?"),
    (StatCategory::Physical, "What's their most distinctive feature?"),
];

/// Actions clients may send to a room, tagged by `type` on the wire.
///
/// The vocabulary is closed: anything unrecognized deserializes to
/// [`Action::Unknown`] and is ignored. Transition actions carry every field
/// that changes together, so a broadcast can never contain a phase that is
/// inconsistent with its companion payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum Action {
    /// Join or rejoin the room with a stable player id.
    #[serde(rename = "JOIN", rename_all = "camelCase")]
    Join {
        /// Stable client-chosen id; rejoining with it updates the connection.
        player_id: String,
        /// Display name.
        name: String,
    },
    /// Leave the room for good.
    #[serde(rename = "LEAVE", rename_all = "camelCase")]
    Leave {
        /// Player to remove.
        player_id: String,
    },
    /// Start the game from the lobby (host only).
    #[serde(rename = "START_GAME", rename_all = "camelCase")]
    StartGame {
        /// Run the starting-stats questionnaire before the first round.
        #[serde(default)]
        starting_stats_mode: bool,
        /// Show the tutorial first.
        #[serde(default)]
        tutorial: bool,
    },
    /// Submit a free-text answer for the current round.
    #[serde(rename = "SUBMIT_ATTRIBUTE", rename_all = "camelCase")]
    SubmitAttribute {
        /// Submitting player.
        player_id: String,
        /// Answer text.
        text: String,
    },
    /// Add one vote of weight to a displayed wheel slice.
    #[serde(rename = "VOTE", rename_all = "camelCase")]
    Vote {
        /// Voting player.
        player_id: String,
        /// Label of the slice being boosted.
        label: String,
    },
    /// Force the phase forward (host only; backward moves are ignored).
    #[serde(rename = "SET_PHASE")]
    SetPhase {
        /// Target phase.
        phase: GamePhase,
    },
    /// Set or clear the shared on-screen timer (host only).
    #[serde(rename = "SET_TIMER")]
    SetTimer {
        /// Seconds remaining, or `null` to clear.
        seconds: Option<u32>,
    },
    /// Answer the active starting-stats slot.
    #[serde(rename = "SUBMIT_STARTING_STAT", rename_all = "camelCase")]
    SubmitStartingStat {
        /// Answering player; must match the slot assignment.
        player_id: String,
        /// Answer text.
        text: String,
    },
    /// Advance the starting-stats cursor (host only).
    #[serde(rename = "ADVANCE_STARTING_STATS")]
    AdvanceStartingStats,
    /// Replace the avatar's name and traits wholesale (host only).
    #[serde(rename = "SET_DATER", rename_all = "camelCase")]
    SetDater {
        /// New avatar name.
        name: String,
        /// New trait set.
        #[serde(default)]
        traits: Vec<String>,
    },
    /// Replace the avatar speech bubbles (host only).
    #[serde(rename = "SET_BUBBLES")]
    SetBubbles {
        /// Bubble texts.
        bubbles: Vec<String>,
    },
    /// Append a line to the narrative conversation (host only).
    #[serde(rename = "ADD_MESSAGE")]
    AddMessage {
        /// Speaker tag.
        speaker: String,
        /// The line.
        text: String,
    },
    /// Set the compatibility scalar (host only; clamped to `[0, 100]`).
    #[serde(rename = "SET_COMPATIBILITY")]
    SetCompatibility {
        /// New value.
        value: i64,
    },
    /// Append a trait to the avatar (host only).
    #[serde(rename = "ADD_ATTRIBUTE")]
    AddTrait {
        /// Trait text.
        value: String,
    },
    /// Clear all avatar traits (host only).
    #[serde(rename = "CLEAR_ATTRIBUTES")]
    ClearTraits,
    /// Set the tutorial step counter (host only).
    #[serde(rename = "SET_TUTORIAL_STEP")]
    SetTutorialStep {
        /// Step index.
        step: u32,
    },
    /// Post a line to the player banter log.
    #[serde(rename = "SEND_CHAT", rename_all = "camelCase")]
    SendChat {
        /// Posting player.
        player_id: String,
        /// Message text.
        text: String,
    },
    /// Enter answer selection while clustering runs (host only).
    #[serde(rename = "BEGIN_ANSWER_SELECTION")]
    BeginAnswerSelection,
    /// Publish the clustered slices and show the wheel (host only).
    #[serde(rename = "SHOW_WHEEL")]
    ShowWheel {
        /// Weighted candidate slices.
        slices: Vec<WheelSlice>,
    },
    /// Commit the pre-drawn winner and start the spin animation (host only).
    #[serde(rename = "COMMIT_WHEEL_WINNER", rename_all = "camelCase")]
    CommitWheelWinner {
        /// The slice that will win; immutable once set.
        winner: WheelSlice,
        /// Target rotation angle the animation resolves to.
        rotation: f32,
    },
    /// End the spin and reveal the winner (host only).
    #[serde(rename = "FINISH_WHEEL")]
    FinishWheel,
    /// Resolve the round: append the avatar's reaction, update compatibility,
    /// record the winning answer, and move to the resolve phase (host only).
    #[serde(rename = "APPEND_REACTION", rename_all = "camelCase")]
    AppendReaction {
        /// Speaker tag for the reaction line.
        speaker: String,
        /// The reaction line.
        text: String,
        /// New compatibility value, when the round changes it.
        compatibility: Option<i64>,
        /// Winning answer text, when the wheel was skipped.
        winning_attribute: Option<String>,
    },
    /// Advance the round counter and route to the next round kind (host only).
    #[serde(rename = "NEXT_ROUND")]
    NextRound,
    /// Terminate the game (host only).
    #[serde(rename = "END_GAME")]
    EndGame,
    /// Anything this version does not understand.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Whether this action requires host authority.
    fn host_gated(&self) -> bool {
        !matches!(
            self,
            Action::Join { .. }
                | Action::Leave { .. }
                | Action::SubmitAttribute { .. }
                | Action::Vote { .. }
                | Action::SubmitStartingStat { .. }
                | Action::SendChat { .. }
                | Action::Unknown
        )
    }
}

/// Result of applying an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// State changed; persist and broadcast.
    Applied,
    /// Dropped as a no-op; the reason is for logs only.
    Ignored(&'static str),
}

impl Outcome {
    /// Whether the action mutated the state.
    pub fn applied(self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Apply one action to the authoritative state.
///
/// Pure with respect to everything but `state`; the actor owns the side
/// effects (persist, broadcast). `origin` is the transport connection the
/// action arrived on and is the sole authorization input for host-gated
/// actions.
pub fn apply(state: &mut GameState, action: Action, origin: Uuid) -> Outcome {
    if action.host_gated() && !state.is_host_connection(origin) {
        debug!(?action, %origin, "dropping host-gated action from non-host connection");
        return Outcome::Ignored("not the host connection");
    }

    if state.phase.is_terminal() && !matches!(action, Action::Join { .. }) {
        return Outcome::Ignored("game has ended");
    }

    match action {
        Action::Join { player_id, name } => {
            if player_id.trim().is_empty() {
                return Outcome::Ignored("empty player id");
            }
            state.join(&player_id, &name, origin);
            Outcome::Applied
        }
        Action::Leave { player_id } => {
            if !state.players.contains_key(&player_id) {
                return Outcome::Ignored("unknown player");
            }
            state.leave(&player_id);
            Outcome::Applied
        }
        Action::StartGame {
            starting_stats_mode,
            tutorial,
        } => start_game(state, starting_stats_mode, tutorial),
        Action::SubmitAttribute { player_id, text } => submit_attribute(state, player_id, text),
        Action::Vote { label, .. } => vote(state, &label),
        Action::SetPhase { phase } => set_phase(state, phase),
        Action::SetTimer { seconds } => {
            state.timer = seconds;
            Outcome::Applied
        }
        Action::SubmitStartingStat { player_id, text } => {
            submit_starting_stat(state, &player_id, text)
        }
        Action::AdvanceStartingStats => advance_starting_stats(state),
        Action::SetDater { name, traits } => {
            state.dater.name = name;
            state.dater.traits = traits;
            Outcome::Applied
        }
        Action::SetBubbles { bubbles } => {
            state.bubbles = bubbles;
            Outcome::Applied
        }
        Action::AddMessage { speaker, text } => {
            state.push_conversation(ChatMessage { speaker, text });
            Outcome::Applied
        }
        Action::SetCompatibility { value } => {
            state.set_compatibility(value);
            Outcome::Applied
        }
        Action::AddTrait { value } => {
            state.dater.traits.push(value);
            Outcome::Applied
        }
        Action::ClearTraits => {
            state.dater.traits.clear();
            Outcome::Applied
        }
        Action::SetTutorialStep { step } => {
            state.tutorial_step = step;
            Outcome::Applied
        }
        Action::SendChat { player_id, text } => {
            if !state.players.contains_key(&player_id) {
                return Outcome::Ignored("chat from unknown player");
            }
            state.push_chat(ChatMessage {
                speaker: player_id,
                text,
            });
            Outcome::Applied
        }
        Action::BeginAnswerSelection => begin_answer_selection(state),
        Action::ShowWheel { slices } => show_wheel(state, slices),
        Action::CommitWheelWinner { winner, rotation } => commit_winner(state, winner, rotation),
        Action::FinishWheel => finish_wheel(state),
        Action::AppendReaction {
            speaker,
            text,
            compatibility,
            winning_attribute,
        } => append_reaction(state, speaker, text, compatibility, winning_attribute),
        Action::NextRound => next_round(state),
        Action::EndGame => {
            state.phase = GamePhase::Ended;
            Outcome::Applied
        }
        Action::Unknown => Outcome::Ignored("unknown action"),
    }
}

fn start_game(state: &mut GameState, starting_stats_mode: bool, tutorial: bool) -> Outcome {
    if state.phase != GamePhase::Lobby {
        return Outcome::Ignored("game already started");
    }
    if state.players.is_empty() {
        return Outcome::Ignored("cannot start an empty room");
    }

    state.round = 1;
    if starting_stats_mode {
        let player_ids: Vec<String> = state.players.keys().cloned().collect();
        state.starting_stats = Some(StartingStatsState::build(&player_ids, STARTING_STAT_SLOTS));
    }

    // The lobby branch is chosen exactly once, here.
    state.phase = if tutorial {
        GamePhase::Tutorial
    } else if starting_stats_mode {
        GamePhase::StartingStats
    } else {
        GamePhase::RoundTalk
    };
    Outcome::Applied
}

fn submit_attribute(state: &mut GameState, player_id: String, text: String) -> Outcome {
    if !matches!(state.phase, GamePhase::RoundTalk | GamePhase::PlotTwist) {
        return Outcome::Ignored("answers are only accepted during a round");
    }
    if !state.players.contains_key(&player_id) {
        return Outcome::Ignored("answer from unknown player");
    }
    if text.trim().is_empty() {
        return Outcome::Ignored("empty answer");
    }

    // One answer per player per round; resubmitting replaces it.
    match state.answers.iter_mut().find(|a| a.player_id == player_id) {
        Some(existing) => existing.text = text,
        None => state.answers.push(RoundAnswer { player_id, text }),
    }
    Outcome::Applied
}

fn vote(state: &mut GameState, label: &str) -> Outcome {
    let Some(wheel) = state.wheel.as_mut() else {
        return Outcome::Ignored("no wheel to vote on");
    };
    if wheel.phase != WheelPhase::Showing {
        return Outcome::Ignored("voting is only open while the wheel shows");
    }
    match wheel.slices.iter_mut().find(|slice| slice.label == label) {
        Some(slice) => {
            slice.weight += 1.0;
            Outcome::Applied
        }
        None => Outcome::Ignored("vote for an unknown slice"),
    }
}

fn set_phase(state: &mut GameState, phase: GamePhase) -> Outcome {
    if phase.rank() < state.phase.rank() {
        return Outcome::Ignored("phase may only move forward");
    }
    if phase == state.phase {
        return Outcome::Ignored("already in that phase");
    }
    state.phase = phase;
    Outcome::Applied
}

fn submit_starting_stat(state: &mut GameState, player_id: &str, text: String) -> Outcome {
    if state.phase != GamePhase::StartingStats {
        return Outcome::Ignored("not in starting stats");
    }
    if text.trim().is_empty() {
        return Outcome::Ignored("empty answer");
    }
    let Some(stats) = state.starting_stats.as_mut() else {
        return Outcome::Ignored("starting stats not initialized");
    };

    match stats.record_answer(player_id, text.clone()) {
        Ok(StatCategory::Name) => {
            state.dater.name = text;
            Outcome::Applied
        }
        Ok(_) => {
            state.dater.traits.push(text);
            Outcome::Applied
        }
        Err(reason) => Outcome::Ignored(reason),
    }
}

fn advance_starting_stats(state: &mut GameState) -> Outcome {
    if state.phase != GamePhase::StartingStats {
        return Outcome::Ignored("not in starting stats");
    }
    let Some(stats) = state.starting_stats.as_mut() else {
        return Outcome::Ignored("starting stats not initialized");
    };

    match stats.advance() {
        Ok(complete) => {
            if complete {
                state.phase = GamePhase::Reaction;
            }
            Outcome::Applied
        }
        Err(reason) => Outcome::Ignored(reason),
    }
}

fn begin_answer_selection(state: &mut GameState) -> Outcome {
    if state.phase != GamePhase::RoundTalk {
        return Outcome::Ignored("answer selection follows the talk phase");
    }
    state.phase = GamePhase::AnswerSelection;
    state.wheel = Some(WheelState::grouping());
    Outcome::Applied
}

fn show_wheel(state: &mut GameState, slices: Vec<WheelSlice>) -> Outcome {
    let Some(wheel) = state.wheel.as_mut() else {
        return Outcome::Ignored("no wheel in progress");
    };
    if wheel.phase != WheelPhase::Grouping {
        return Outcome::Ignored("wheel slices are already shown");
    }
    if slices.is_empty() {
        return Outcome::Ignored("cannot show an empty wheel");
    }
    wheel.slices = slices;
    wheel.phase = WheelPhase::Showing;
    Outcome::Applied
}

fn commit_winner(state: &mut GameState, winner: WheelSlice, rotation: f32) -> Outcome {
    let Some(wheel) = state.wheel.as_mut() else {
        return Outcome::Ignored("no wheel in progress");
    };
    if wheel.phase != WheelPhase::Showing {
        return Outcome::Ignored("winner can only be committed from the showing sub-phase");
    }
    if wheel.winning_slice.is_some() {
        return Outcome::Ignored("winner already committed");
    }

    state.winning_attribute = Some(winner.label.clone());
    wheel.winning_slice = Some(winner);
    wheel.rotation = rotation;
    wheel.phase = WheelPhase::Spinning;
    Outcome::Applied
}

fn finish_wheel(state: &mut GameState) -> Outcome {
    let Some(wheel) = state.wheel.as_mut() else {
        return Outcome::Ignored("no wheel in progress");
    };
    if wheel.phase != WheelPhase::Spinning {
        return Outcome::Ignored("wheel is not spinning");
    }
    wheel.phase = WheelPhase::Winner;
    Outcome::Applied
}

fn append_reaction(
    state: &mut GameState,
    speaker: String,
    text: String,
    compatibility: Option<i64>,
    winning_attribute: Option<String>,
) -> Outcome {
    if !matches!(
        state.phase,
        GamePhase::Reaction
            | GamePhase::RoundTalk
            | GamePhase::AnswerSelection
            | GamePhase::PlotTwist
            | GamePhase::PlotTwistReaction
    ) {
        return Outcome::Ignored("no round to resolve");
    }

    state.push_conversation(ChatMessage { speaker, text });
    if let Some(value) = compatibility {
        state.set_compatibility(value);
    }
    if let Some(answer) = winning_attribute {
        // The wheel path has already recorded the winner; this covers the
        // skipped-wheel single-answer path.
        state.winning_attribute.get_or_insert(answer);
    }
    state.phase = match state.phase {
        GamePhase::PlotTwist => GamePhase::PlotTwistReaction,
        _ => GamePhase::RoundResolve,
    };
    Outcome::Applied
}

fn next_round(state: &mut GameState) -> Outcome {
    if !matches!(
        state.phase,
        GamePhase::Reaction | GamePhase::RoundResolve | GamePhase::PlotTwistReaction
    ) {
        return Outcome::Ignored("round is not resolved yet");
    }

    let plan = RoundPlan::new(state.max_rounds);
    if !plan.has_next(state.round) {
        return Outcome::Ignored("round budget exhausted");
    }

    // Only Reaction keeps its round number: the first real round follows the
    // starting-stats reaction without consuming budget.
    if state.phase != GamePhase::Reaction {
        state.round += 1;
    }
    state.clear_round_payloads();

    state.phase = match plan.kind_of(state.round, state.plot_twist_completed) {
        RoundKind::PlotTwist => {
            state.plot_twist_completed = true;
            GamePhase::PlotTwist
        }
        _ => GamePhase::RoundTalk,
    };
    Outcome::Applied
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_conn() -> Uuid {
        Uuid::new_v4()
    }

    fn room_with_host(conn: Uuid) -> GameState {
        let mut state = GameState::new(6);
        assert!(
            apply(
                &mut state,
                Action::Join {
                    player_id: "ada".into(),
                    name: "Ada".into()
                },
                conn,
            )
            .applied()
        );
        state
    }

    fn started_room(conn: Uuid) -> GameState {
        let mut state = room_with_host(conn);
        assert!(
            apply(
                &mut state,
                Action::StartGame {
                    starting_stats_mode: false,
                    tutorial: false
                },
                conn,
            )
            .applied()
        );
        state
    }

    #[test]
    fn roster_never_duplicates_and_has_one_host() {
        let conn = host_conn();
        let mut state = room_with_host(conn);
        for _ in 0..3 {
            apply(
                &mut state,
                Action::Join {
                    player_id: "ada".into(),
                    name: "Ada".into(),
                },
                Uuid::new_v4(),
            );
            apply(
                &mut state,
                Action::Join {
                    player_id: "bob".into(),
                    name: "Bob".into(),
                },
                Uuid::new_v4(),
            );
        }
        assert_eq!(state.players.len(), 2);
        assert_eq!(state.players.values().filter(|p| p.is_host).count(), 1);
    }

    #[test]
    fn host_gating_uses_connection_id_not_flag() {
        let conn = host_conn();
        let mut state = room_with_host(conn);
        let stranger = Uuid::new_v4();

        let outcome = apply(
            &mut state,
            Action::StartGame {
                starting_stats_mode: false,
                tutorial: false,
            },
            stranger,
        );
        assert!(!outcome.applied());
        assert_eq!(state.phase, GamePhase::Lobby);

        // Host rejoins on a fresh connection; the old one loses authority.
        let fresh = Uuid::new_v4();
        apply(
            &mut state,
            Action::Join {
                player_id: "ada".into(),
                name: "Ada".into(),
            },
            fresh,
        );
        assert!(
            !apply(
                &mut state,
                Action::StartGame {
                    starting_stats_mode: false,
                    tutorial: false
                },
                conn,
            )
            .applied()
        );
        assert!(
            apply(
                &mut state,
                Action::StartGame {
                    starting_stats_mode: false,
                    tutorial: false
                },
                fresh,
            )
            .applied()
        );
    }

    #[test]
    fn start_game_branches_to_starting_stats() {
        let conn = host_conn();
        let mut state = room_with_host(conn);
        assert!(
            apply(
                &mut state,
                Action::StartGame {
                    starting_stats_mode: true,
                    tutorial: false
                },
                conn,
            )
            .applied()
        );
        assert_eq!(state.phase, GamePhase::StartingStats);
        assert!(state.starting_stats.is_some());
        assert_eq!(state.round, 1);
    }

    #[test]
    fn phase_never_moves_backward() {
        let conn = host_conn();
        let mut state = started_room(conn);
        assert_eq!(state.phase, GamePhase::RoundTalk);

        let outcome = apply(
            &mut state,
            Action::SetPhase {
                phase: GamePhase::Lobby,
            },
            conn,
        );
        assert!(!outcome.applied());
        assert_eq!(state.phase, GamePhase::RoundTalk);
    }

    #[test]
    fn wheel_winner_is_immutable_and_subphase_forward_only() {
        let conn = host_conn();
        let mut state = started_room(conn);
        apply(
            &mut state,
            Action::SubmitAttribute {
                player_id: "ada".into(),
                text: "tango lessons".into(),
            },
            conn,
        );
        assert!(apply(&mut state, Action::BeginAnswerSelection, conn).applied());
        assert!(
            apply(
                &mut state,
                Action::ShowWheel {
                    slices: vec![
                        WheelSlice {
                            label: "tango lessons".into(),
                            weight: 2.0
                        },
                        WheelSlice {
                            label: "karaoke".into(),
                            weight: 1.0
                        },
                    ]
                },
                conn,
            )
            .applied()
        );

        let winner = WheelSlice {
            label: "karaoke".into(),
            weight: 1.0,
        };
        assert!(
            apply(
                &mut state,
                Action::CommitWheelWinner {
                    winner: winner.clone(),
                    rotation: 2160.0
                },
                conn,
            )
            .applied()
        );
        assert_eq!(state.winning_attribute.as_deref(), Some("karaoke"));

        // A second commit is dropped and the original winner stands.
        let outcome = apply(
            &mut state,
            Action::CommitWheelWinner {
                winner: WheelSlice {
                    label: "tango lessons".into(),
                    weight: 2.0,
                },
                rotation: 1800.0,
            },
            conn,
        );
        assert!(!outcome.applied());
        assert_eq!(
            state.wheel.as_ref().unwrap().winning_slice.as_ref().unwrap(),
            &winner
        );

        assert!(apply(&mut state, Action::FinishWheel, conn).applied());
        assert!(!apply(&mut state, Action::FinishWheel, conn).applied());
    }

    #[test]
    fn votes_adjust_weights_only_while_showing() {
        let conn = host_conn();
        let mut state = started_room(conn);
        apply(&mut state, Action::BeginAnswerSelection, conn);
        assert!(
            !apply(
                &mut state,
                Action::Vote {
                    player_id: "ada".into(),
                    label: "karaoke".into()
                },
                conn,
            )
            .applied()
        );

        apply(
            &mut state,
            Action::ShowWheel {
                slices: vec![WheelSlice {
                    label: "karaoke".into(),
                    weight: 1.0,
                }],
            },
            conn,
        );
        assert!(
            apply(
                &mut state,
                Action::Vote {
                    player_id: "ada".into(),
                    label: "karaoke".into()
                },
                conn,
            )
            .applied()
        );
        assert_eq!(state.wheel.as_ref().unwrap().slices[0].weight, 2.0);
    }

    #[test]
    fn plot_twist_triggers_exactly_once_entering_round_three() {
        let conn = host_conn();
        for budget in [4u32, 6, 9] {
            let mut state = room_with_host(conn);
            state.max_rounds = budget;
            apply(
                &mut state,
                Action::StartGame {
                    starting_stats_mode: false,
                    tutorial: false,
                },
                conn,
            );

            let mut plot_twists = 0;
            while state.round < budget {
                let before = state.round;
                state.phase = GamePhase::RoundResolve;
                assert!(apply(&mut state, Action::NextRound, conn).applied());
                if state.phase == GamePhase::PlotTwist {
                    plot_twists += 1;
                    assert_eq!((before, state.round), (2, 3), "budget {budget}");
                    // Resolve the twist like the orchestrator would.
                    state.phase = GamePhase::PlotTwistReaction;
                }
            }
            assert_eq!(plot_twists, 1, "budget {budget}");
        }
    }

    #[test]
    fn next_round_stops_at_the_budget() {
        let conn = host_conn();
        let mut state = started_room(conn);
        state.round = state.max_rounds;
        state.phase = GamePhase::RoundResolve;
        assert!(!apply(&mut state, Action::NextRound, conn).applied());
    }

    #[test]
    fn ended_is_terminal() {
        let conn = host_conn();
        let mut state = started_room(conn);
        assert!(apply(&mut state, Action::EndGame, conn).applied());
        assert_eq!(state.phase, GamePhase::Ended);
        assert!(
            !apply(
                &mut state,
                Action::SetPhase {
                    phase: GamePhase::RoundTalk
                },
                conn,
            )
            .applied()
        );
    }

    #[test]
    fn unknown_actions_are_silently_dropped() {
        let conn = host_conn();
        let mut state = started_room(conn);
        let before = state.clone();
        assert!(!apply(&mut state, Action::Unknown, conn).applied());
        assert_eq!(state, before);

        let parsed: Action =
            serde_json::from_str(r#"{"type":"LAUNCH_CONFETTI","amount":9000}"#).unwrap();
        assert_eq!(parsed, Action::Unknown);
    }

    #[test]
    fn resubmitting_replaces_a_round_answer() {
        let conn = host_conn();
        let mut state = started_room(conn);
        for text in ["mini golf", "mini-golf at midnight"] {
            apply(
                &mut state,
                Action::SubmitAttribute {
                    player_id: "ada".into(),
                    text: text.into(),
                },
                conn,
            );
        }
        assert_eq!(state.answers.len(), 1);
        assert_eq!(state.answers[0].text, "mini-golf at midnight");
    }
}
