//! The authoritative room state and its domain types.
//!
//! `GameState` is exclusively owned by the room actor; everything here is plain
//! data plus the invariant-preserving mutators the reducer relies on.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::phase::GamePhase;

/// Maximum number of entries retained in each message log (oldest evicted).
pub const LOG_CAP: usize = 50;

/// One spoken or written line in a message log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    /// Who said it (player id, `"dater"`, or `"narrator"`).
    pub speaker: String,
    /// The line itself.
    pub text: String,
}

/// The shared narrative character the players are collectively dating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Avatar {
    /// Display name, chosen during starting stats (or a default).
    pub name: String,
    /// Accumulated trait strings contributed by player answers.
    pub traits: Vec<String>,
}

/// A player as tracked by the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Stable client-chosen identifier; survives reconnects.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Sticky host marker. A UI hint only; authorization always goes through
    /// the live host connection id instead.
    pub is_host: bool,
    /// Volatile transport connection id, replaced on every reconnect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<Uuid>,
}

/// Category of a starting-stats question slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatCategory {
    /// A physical trait of the avatar.
    Physical,
    /// An emotional trait of the avatar.
    Emotional,
    /// The avatar's name.
    Name,
}

/// Assignment of one question slot to one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatAssignment {
    /// The player who must answer this slot.
    pub player_id: String,
    /// What kind of trait the answer contributes.
    pub category: StatCategory,
    /// The question shown to the assigned player.
    pub prompt: String,
}

/// One recorded starting-stats answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatAnswer {
    /// Index of the slot this answers.
    pub question_index: usize,
    /// Player who answered.
    pub player_id: String,
    /// The free-text answer.
    pub text: String,
}

/// Progress through the pre-game starting-stats questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartingStatsState {
    /// Slot-to-player assignments, fixed at game start.
    pub assignments: Vec<StatAssignment>,
    /// Cursor pointing at the active slot.
    pub current_question_index: usize,
    /// Append-only answer log.
    pub answers: Vec<StatAnswer>,
}

impl StartingStatsState {
    /// Distribute the question slots across players in join order, cycling
    /// through the roster so nobody answers twice before everyone answered once.
    pub fn build(player_ids: &[String], slots: &[(StatCategory, &str)]) -> Self {
        let assignments = slots
            .iter()
            .enumerate()
            .map(|(index, (category, prompt))| StatAssignment {
                player_id: player_ids[index % player_ids.len()].clone(),
                category: *category,
                prompt: (*prompt).to_owned(),
            })
            .collect();

        Self {
            assignments,
            current_question_index: 0,
            answers: Vec::new(),
        }
    }

    /// The assignment at the cursor, if the questionnaire is not finished.
    pub fn current_assignment(&self) -> Option<&StatAssignment> {
        self.assignments.get(self.current_question_index)
    }

    /// Whether an answer has been recorded for the active slot.
    pub fn current_answered(&self) -> bool {
        self.answers
            .iter()
            .any(|answer| answer.question_index == self.current_question_index)
    }

    /// Record an answer for the active slot. Rejects answers from any player
    /// other than the assigned one and duplicate answers for the same slot.
    pub fn record_answer(&mut self, player_id: &str, text: String) -> Result<StatCategory, &'static str> {
        let assignment = self
            .current_assignment()
            .ok_or("starting stats already complete")?;
        if assignment.player_id != player_id {
            return Err("answer from a player not assigned to the active slot");
        }
        if self.current_answered() {
            return Err("active slot already answered");
        }

        let category = assignment.category;
        self.answers.push(StatAnswer {
            question_index: self.current_question_index,
            player_id: player_id.to_owned(),
            text,
        });
        Ok(category)
    }

    /// Move the cursor forward. Only legal once the active slot is answered.
    pub fn advance(&mut self) -> Result<bool, &'static str> {
        if self.current_question_index >= self.assignments.len() {
            return Err("starting stats already complete");
        }
        if !self.current_answered() {
            return Err("cannot advance before the active slot is answered");
        }
        self.current_question_index += 1;
        Ok(self.is_complete())
    }

    /// Whether every slot has been answered and passed.
    pub fn is_complete(&self) -> bool {
        self.current_question_index >= self.assignments.len()
    }
}

/// One weighted candidate on the selection wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WheelSlice {
    /// Representative answer text for this cluster.
    pub label: String,
    /// Cluster weight (submission count plus votes).
    pub weight: f32,
}

/// Sub-phase of the wheel; only ever moves forward within one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WheelPhase {
    /// Answers are being clustered into slices.
    Grouping,
    /// Slices are on screen; votes may adjust weights.
    Showing,
    /// The spin animation is running against a pre-committed winner.
    Spinning,
    /// The winner is revealed.
    Winner,
}

/// Wheel payload carried inside the answer-selection and plot-twist phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WheelState {
    /// Weighted candidate slices.
    pub slices: Vec<WheelSlice>,
    /// Current sub-phase.
    pub phase: WheelPhase,
    /// Rotation angle in degrees driving the client animation.
    pub rotation: f32,
    /// The committed winner, immutable once drawn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_slice: Option<WheelSlice>,
}

impl WheelState {
    /// Fresh wheel in the grouping sub-phase.
    pub fn grouping() -> Self {
        Self {
            slices: Vec::new(),
            phase: WheelPhase::Grouping,
            rotation: 0.0,
            winning_slice: None,
        }
    }
}

/// A free-text answer submitted during the current round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoundAnswer {
    /// Player who submitted it.
    pub player_id: String,
    /// The answer text.
    pub text: String,
}

/// The single authoritative state of a room.
///
/// Mutated only by reducer application inside the room actor; broadcast in
/// full to every connection after each applied action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Current phase.
    pub phase: GamePhase,
    /// Roster in join order, keyed by stable player id.
    #[schema(value_type = Object)]
    pub players: IndexMap<String, Player>,
    /// Stable id of the sticky host player.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    /// Live connection id authorized to issue host actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_connection_id: Option<Uuid>,
    /// The shared date avatar.
    pub dater: Avatar,
    /// Compatibility scalar in `[0, 100]`.
    pub compatibility: u8,
    /// 1-based round counter; 0 while in the lobby.
    pub round: u32,
    /// Total round budget.
    pub max_rounds: u32,
    /// Whether the one-time plot twist has already run.
    pub plot_twist_completed: bool,
    /// Pre-game questionnaire progress, present only in that flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_stats: Option<StartingStatsState>,
    /// Wheel payload, present during answer selection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel: Option<WheelState>,
    /// Free-text answers collected this round.
    pub answers: Vec<RoundAnswer>,
    /// The answer that won the current round, once decided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_attribute: Option<String>,
    /// Seconds remaining on the shared on-screen timer, if one is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<u32>,
    /// Current tutorial step shown to clients.
    pub tutorial_step: u32,
    /// Ephemeral speech bubbles shown above the avatar.
    pub bubbles: Vec<String>,
    /// Narrative log between the avatar and the table, capped at [`LOG_CAP`].
    pub conversation: Vec<ChatMessage>,
    /// Player banter log, capped at [`LOG_CAP`].
    pub player_chat: Vec<ChatMessage>,
}

impl GameState {
    /// Fresh lobby state for a new room.
    pub fn new(max_rounds: u32) -> Self {
        Self {
            phase: GamePhase::Lobby,
            players: IndexMap::new(),
            host_id: None,
            host_connection_id: None,
            dater: Avatar::default(),
            compatibility: 50,
            round: 0,
            max_rounds,
            plot_twist_completed: false,
            starting_stats: None,
            wheel: None,
            answers: Vec::new(),
            winning_attribute: None,
            timer: None,
            tutorial_step: 0,
            bubbles: Vec::new(),
            conversation: Vec::new(),
            player_chat: Vec::new(),
        }
    }

    /// Add or re-attach a player. Idempotent by player id: rejoining updates
    /// the live connection id instead of duplicating the roster entry; the
    /// first player ever to join becomes the sticky host.
    pub fn join(&mut self, player_id: &str, name: &str, conn_id: Uuid) {
        match self.players.get_mut(player_id) {
            Some(player) => {
                player.connection_id = Some(conn_id);
                if !name.trim().is_empty() {
                    player.name = name.to_owned();
                }
            }
            None => {
                let is_host = self.players.is_empty();
                self.players.insert(
                    player_id.to_owned(),
                    Player {
                        id: player_id.to_owned(),
                        name: name.to_owned(),
                        is_host,
                        connection_id: Some(conn_id),
                    },
                );
                if is_host {
                    self.host_id = Some(player_id.to_owned());
                }
            }
        }

        if self.host_id.as_deref() == Some(player_id) {
            self.host_connection_id = Some(conn_id);
        }
    }

    /// Remove a player; if the host leaves, leadership transfers to the next
    /// remaining player in join order.
    pub fn leave(&mut self, player_id: &str) {
        let was_host = self.host_id.as_deref() == Some(player_id);
        // shift_remove keeps the join order of the remaining players.
        if self.players.shift_remove(player_id).is_none() {
            return;
        }

        if was_host {
            self.host_id = None;
            self.host_connection_id = None;
            if let Some((id, player)) = self.players.iter_mut().next() {
                player.is_host = true;
                self.host_id = Some(id.clone());
                self.host_connection_id = player.connection_id;
            }
        }
    }

    /// Whether the given connection currently holds host authority.
    pub fn is_host_connection(&self, conn_id: Uuid) -> bool {
        self.host_connection_id == Some(conn_id)
    }

    /// Append to the narrative log, evicting the oldest entry past the cap.
    pub fn push_conversation(&mut self, message: ChatMessage) {
        push_capped(&mut self.conversation, message);
    }

    /// Append to the player banter log, evicting the oldest entry past the cap.
    pub fn push_chat(&mut self, message: ChatMessage) {
        push_capped(&mut self.player_chat, message);
    }

    /// Set the compatibility scalar, clamped to `[0, 100]`.
    pub fn set_compatibility(&mut self, value: i64) {
        self.compatibility = value.clamp(0, 100) as u8;
    }

    /// Reset per-round payloads when a new round begins.
    pub fn clear_round_payloads(&mut self) {
        self.answers.clear();
        self.wheel = None;
        self.winning_attribute = None;
        self.timer = None;
        self.bubbles.clear();
    }
}

fn push_capped(log: &mut Vec<ChatMessage>, message: ChatMessage) {
    if log.len() >= LOG_CAP {
        log.remove(0);
    }
    log.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn first_player_becomes_host() {
        let mut state = GameState::new(6);
        let c = conn();
        state.join("ada", "Ada", c);
        assert_eq!(state.host_id.as_deref(), Some("ada"));
        assert_eq!(state.host_connection_id, Some(c));
        assert!(state.players["ada"].is_host);
    }

    #[test]
    fn rejoin_updates_connection_without_duplicating() {
        let mut state = GameState::new(6);
        state.join("ada", "Ada", conn());
        state.join("bob", "Bob", conn());

        let fresh = conn();
        state.join("ada", "Ada", fresh);

        assert_eq!(state.players.len(), 2);
        assert_eq!(state.players["ada"].connection_id, Some(fresh));
        // The sticky host rejoining also refreshes the authorized connection.
        assert_eq!(state.host_connection_id, Some(fresh));
    }

    #[test]
    fn host_departure_promotes_next_in_join_order() {
        let mut state = GameState::new(6);
        state.join("ada", "Ada", conn());
        let bob_conn = conn();
        state.join("bob", "Bob", bob_conn);
        state.join("cyd", "Cyd", conn());

        state.leave("ada");

        assert_eq!(state.host_id.as_deref(), Some("bob"));
        assert_eq!(state.host_connection_id, Some(bob_conn));
        assert!(state.players["bob"].is_host);
        let hosts = state.players.values().filter(|p| p.is_host).count();
        assert_eq!(hosts, 1);
    }

    #[test]
    fn logs_evict_oldest_past_cap() {
        let mut state = GameState::new(6);
        for i in 0..(LOG_CAP + 10) {
            state.push_conversation(ChatMessage {
                speaker: "dater".into(),
                text: format!("line {i}"),
            });
        }
        assert_eq!(state.conversation.len(), LOG_CAP);
        assert_eq!(state.conversation[0].text, "line 10");
    }

    #[test]
    fn compatibility_is_clamped() {
        let mut state = GameState::new(6);
        state.set_compatibility(250);
        assert_eq!(state.compatibility, 100);
        state.set_compatibility(-3);
        assert_eq!(state.compatibility, 0);
    }

    #[test]
    fn starting_stats_distribute_evenly_before_repeats() {
        let players = vec!["ada".to_owned(), "bob".to_owned(), "cyd".to_owned()];
        let slots = [
            (StatCategory::Name, "What is their name?"),
            (StatCategory::Physical, "Describe their hair."),
            (StatCategory::Emotional, "What is their biggest fear?"),
            (StatCategory::Physical, "What are they wearing?"),
        ];
        let stats = StartingStatsState::build(&players, &slots);
        let assigned: Vec<_> = stats
            .assignments
            .iter()
            .map(|a| a.player_id.as_str())
            .collect();
        assert_eq!(assigned, vec!["ada", "bob", "cyd", "ada"]);
    }

    #[test]
    fn starting_stats_enforce_assignment_and_order() {
        let players = vec!["ada".to_owned(), "bob".to_owned()];
        let slots = [
            (StatCategory::Name, "Name them."),
            (StatCategory::Physical, "Hair?"),
        ];
        let mut stats = StartingStatsState::build(&players, &slots);

        assert!(stats.record_answer("bob", "nope".into()).is_err());
        assert!(stats.advance().is_err());

        assert_eq!(stats.record_answer("ada", "Morgan".into()), Ok(StatCategory::Name));
        assert!(stats.record_answer("ada", "again".into()).is_err());
        assert_eq!(stats.advance(), Ok(false));

        assert_eq!(
            stats.record_answer("bob", "improbably tall".into()),
            Ok(StatCategory::Physical)
        );
        assert_eq!(stats.advance(), Ok(true));
        assert!(stats.is_complete());
    }
}
