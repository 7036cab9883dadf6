//! The host-side game loop.
//!
//! The orchestrator is the one client that drives a room through its rounds:
//! it reveals prompts, collects answers, runs the wheel, narrates reactions,
//! and advances the round counter, all by sending the same actions any client
//! would. Every external collaborator call is raced against a timeout so a
//! slow backend degrades the experience instead of freezing it.

pub mod audio;
pub mod narrator;
pub mod wheel;

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, time::timeout};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    engine::{
        audio::{AudioQueue, SpeakerChannel},
        narrator::{AnswerGrouper, LineGenerator, ReactionPrompt, generate_or_fallback},
        wheel::SelectionWheel,
    },
    room::{RoomHandle, reducer::Action},
    state::{
        game::{GameState, WheelPhase, WheelSlice},
        phase::{GamePhase, RoundKind, RoundPlan},
    },
};

/// Speaker tag for out-of-character narration lines.
const NARRATOR_SPEAKER: &str = "narrator";

/// Built-in round prompts, cycled when the budget outruns the catalog.
const ROUND_PROMPTS: &[&str] = &[
    "The waiter arrives. What does your date order, no hesitation?",
    "Your date mentions a hobby nobody saw coming. What is it?",
    "What's the one thing your date absolutely refuses to talk about?",
    "Your date pulls something unexpected out of their bag. What is it?",
    "What does your date suggest you two do after dinner?",
];

/// Prompt for the one-time special round.
const PLOT_TWIST_PROMPT: &str =
    "Plot twist: your date's ex just sat down at the next table. What does your date do?";

/// Scripted closing conversation, spoken before the game ends.
const WRAP_UP_LINES: [&str; 2] = [
    "Well... that was certainly a night to remember. Thank you all for the company.",
    "And that's a wrap on date night. Tally your compatibility and say your goodbyes!",
];

/// Upper bound on waiting for the room actor to apply an action we sent. The
/// actor is in-process, so this only trips if the room task has died.
const ACTOR_SETTLE: Duration = Duration::from_secs(5);

/// Drives one room through its rounds on behalf of the host connection.
pub struct Orchestrator {
    room: RoomHandle,
    conn: Uuid,
    audio: AudioQueue,
    generator: Arc<dyn LineGenerator>,
    grouper: Arc<dyn AnswerGrouper>,
    wheel: SelectionWheel,
    config: AppConfig,
}

impl Orchestrator {
    /// Build a driver for the given room. `conn` must be the host connection
    /// id, otherwise every action it sends is silently dropped.
    pub fn new(
        room: RoomHandle,
        conn: Uuid,
        audio: AudioQueue,
        generator: Arc<dyn LineGenerator>,
        grouper: Arc<dyn AnswerGrouper>,
        config: AppConfig,
    ) -> Self {
        Self {
            room,
            conn,
            audio,
            generator,
            grouper,
            wheel: SelectionWheel::new(),
            config,
        }
    }

    /// Swap in a deterministically seeded wheel.
    pub fn with_wheel(mut self, wheel: SelectionWheel) -> Self {
        self.wheel = wheel;
        self
    }

    /// Run the game loop until the room reaches its terminal phase.
    pub async fn run(mut self) {
        let mut rx = self.room.subscribe();
        info!(room = %self.room.code(), "orchestrator started");

        loop {
            let state = rx.borrow().clone();
            match state.phase {
                GamePhase::Lobby | GamePhase::Tutorial | GamePhase::StartingStats => {
                    // Players drive these phases themselves; wait them out.
                    let waited = rx
                        .wait_for(|s| {
                            !matches!(
                                s.phase,
                                GamePhase::Lobby | GamePhase::Tutorial | GamePhase::StartingStats
                            )
                        })
                        .await;
                    if waited.is_err() {
                        return;
                    }
                }
                GamePhase::Reaction => self.introduce_dater(&mut rx, &state).await,
                GamePhase::RoundTalk => {
                    let plan = RoundPlan::new(state.max_rounds);
                    if plan.kind_of(state.round, state.plot_twist_completed) == RoundKind::WrapUp {
                        self.run_wrap_up(&mut rx).await;
                        return;
                    }
                    self.run_question_round(&mut rx, &state).await;
                }
                GamePhase::PlotTwist => self.run_plot_twist(&mut rx).await,
                GamePhase::AnswerSelection => {
                    // Restored mid-wheel from a snapshot; resolve the round
                    // with a scripted line rather than re-running the wheel.
                    let line = self.config.fallback_line(state.round).to_owned();
                    self.narrate_and_resolve(&mut rx, line, None, None, GamePhase::RoundResolve)
                        .await;
                }
                GamePhase::RoundResolve | GamePhase::PlotTwistReaction => {
                    let plan = RoundPlan::new(state.max_rounds);
                    if plan.has_next(state.round) {
                        self.act(&mut rx, Action::NextRound, |s| {
                            !matches!(
                                s.phase,
                                GamePhase::RoundResolve | GamePhase::PlotTwistReaction
                            )
                        })
                        .await;
                    } else {
                        self.run_wrap_up(&mut rx).await;
                        return;
                    }
                }
                GamePhase::Ended => {
                    info!(room = %self.room.code(), "orchestrator finished");
                    return;
                }
            }
        }
    }

    /// The avatar greets the table after starting stats assembled it, then the
    /// first real round begins without consuming round budget.
    async fn introduce_dater(&self, rx: &mut watch::Receiver<GameState>, state: &GameState) {
        let name = display_name(state);
        let line = format!("Hi, I'm {name}. Be honest with me tonight and we'll get along fine.");
        self.room.act(
            self.conn,
            Action::AddMessage {
                speaker: name,
                text: line.clone(),
            },
        );
        let spoken = self.audio.enqueue(line, SpeakerChannel::Dater);
        let _ = timeout(self.config.narration_wait_cap, spoken.finished).await;

        self.act(rx, Action::NextRound, |s| s.phase != GamePhase::Reaction)
            .await;
    }

    async fn run_question_round(&mut self, rx: &mut watch::Receiver<GameState>, state: &GameState) {
        let prompt = ROUND_PROMPTS[(state.round.saturating_sub(1)) as usize % ROUND_PROMPTS.len()];
        let collected = self.reveal_and_collect(rx, prompt).await;

        let slices = self.grouper.group(&collected.answers);
        match slices.len() {
            0 => {
                // Nobody answered; the date fills the silence.
                let line = self.generate_reaction(&collected, "an awkward silence").await;
                self.narrate_and_resolve(rx, line, None, None, GamePhase::RoundResolve)
                    .await;
            }
            1 => {
                // A single distinct answer wins outright; the wheel is skipped
                // and the literal answer is recorded with the reaction.
                let label = slices[0].label.clone();
                let line = self.generate_reaction(&collected, &label).await;
                let compatibility =
                    Some(next_compatibility(collected.compatibility, 1.0, 1.0));
                self.narrate_and_resolve(
                    rx,
                    line,
                    compatibility,
                    Some(label),
                    GamePhase::RoundResolve,
                )
                .await;
            }
            _ => self.run_wheel_round(rx, slices).await,
        }
    }

    /// Show the wheel, take votes, commit the winner, and run the reaction
    /// generation inside the spin window.
    async fn run_wheel_round(
        &mut self,
        rx: &mut watch::Receiver<GameState>,
        slices: Vec<WheelSlice>,
    ) {
        self.act(rx, Action::BeginAnswerSelection, |s| {
            s.phase == GamePhase::AnswerSelection
        })
        .await;
        self.act(rx, Action::ShowWheel { slices: slices.clone() }, |s| {
            s.wheel
                .as_ref()
                .is_some_and(|w| w.phase == WheelPhase::Showing)
        })
        .await;

        // Voting window: weight votes land on the broadcast slices.
        tokio::time::sleep(self.config.voting_window).await;
        let voted = self.room.latest();
        let final_slices = voted
            .wheel
            .as_ref()
            .map(|w| w.slices.clone())
            .unwrap_or(slices);

        let Some(draw) = self.wheel.draw(&final_slices) else {
            let line = self.generate_reaction(&voted, "an awkward silence").await;
            self.narrate_and_resolve(rx, line, None, None, GamePhase::RoundResolve)
                .await;
            return;
        };

        self.act(
            rx,
            Action::CommitWheelWinner {
                winner: draw.winner.clone(),
                rotation: draw.rotation,
            },
            |s| {
                s.wheel
                    .as_ref()
                    .is_some_and(|w| w.phase == WheelPhase::Spinning)
            },
        )
        .await;

        // The reaction generates while the wheel spins; whichever finishes
        // last gates the reveal.
        let total_weight: f32 = final_slices.iter().map(|s| s.weight.max(0.0)).sum();
        let (line, _) = tokio::join!(
            self.generate_reaction(&voted, &draw.winner.label),
            tokio::time::sleep(self.config.spin_duration),
        );

        self.act(rx, Action::FinishWheel, |s| {
            s.wheel
                .as_ref()
                .is_some_and(|w| w.phase == WheelPhase::Winner)
        })
        .await;

        let compatibility = Some(next_compatibility(
            voted.compatibility,
            draw.winner.weight,
            total_weight,
        ));
        // The wheel path already recorded the winning attribute at commit.
        self.narrate_and_resolve(rx, line, compatibility, None, GamePhase::RoundResolve)
            .await;
    }

    /// The special round has no wheel: the committed winner is revealed
    /// through narration alone.
    async fn run_plot_twist(&mut self, rx: &mut watch::Receiver<GameState>) {
        let collected = self.reveal_and_collect(rx, PLOT_TWIST_PROMPT).await;

        let slices = self.grouper.group(&collected.answers);
        let winner = self
            .wheel
            .commit_winner(&slices)
            .map(|index| slices[index].clone());

        let (line, compatibility, label) = match winner {
            Some(slice) => {
                let total: f32 = slices.iter().map(|s| s.weight.max(0.0)).sum();
                let line = self.generate_reaction(&collected, &slice.label).await;
                let compatibility =
                    next_compatibility(collected.compatibility, slice.weight, total);
                (line, Some(compatibility), Some(slice.label))
            }
            None => {
                let line = self.generate_reaction(&collected, "a stunned silence").await;
                (line, None, None)
            }
        };

        self.narrate_and_resolve(rx, line, compatibility, label, GamePhase::PlotTwistReaction)
            .await;
    }

    /// The scripted two-line closer; the game only ends once it has been heard.
    async fn run_wrap_up(&self, rx: &mut watch::Receiver<GameState>) {
        let state = self.room.latest();
        let dater = display_name(&state);

        for (index, line) in WRAP_UP_LINES.iter().enumerate() {
            let (speaker, channel) = if index == 0 {
                (dater.clone(), SpeakerChannel::Dater)
            } else {
                (NARRATOR_SPEAKER.to_owned(), SpeakerChannel::Narrator)
            };
            self.room.act(
                self.conn,
                Action::AddMessage {
                    speaker,
                    text: (*line).to_owned(),
                },
            );
            self.audio.enqueue(*line, channel);
        }

        if timeout(self.config.narration_wait_cap, self.audio.wait_for_idle())
            .await
            .is_err()
        {
            warn!(room = %self.room.code(), "closing narration overran its cap");
        }
        self.act(rx, Action::EndGame, |s| s.phase == GamePhase::Ended)
            .await;
    }

    /// Reveal the prompt, open the shared timer, and wait until everyone has
    /// answered or the window closes.
    async fn reveal_and_collect(
        &self,
        rx: &mut watch::Receiver<GameState>,
        prompt: &str,
    ) -> GameState {
        self.room.act(
            self.conn,
            Action::AddMessage {
                speaker: NARRATOR_SPEAKER.to_owned(),
                text: prompt.to_owned(),
            },
        );
        self.room.act(
            self.conn,
            Action::SetTimer {
                seconds: Some(self.config.answer_timeout.as_secs() as u32),
            },
        );

        let _ = timeout(
            self.config.answer_timeout,
            rx.wait_for(|s| !s.players.is_empty() && s.answers.len() >= s.players.len()),
        )
        .await;

        self.room.act(self.conn, Action::SetTimer { seconds: None });
        self.room.latest()
    }

    async fn generate_reaction(&self, state: &GameState, winning: &str) -> String {
        let prompt = ReactionPrompt {
            dater_name: display_name(state),
            winning_attribute: winning.to_owned(),
            round: state.round,
            compatibility: state.compatibility,
        };
        generate_or_fallback(
            self.generator.as_ref(),
            &prompt,
            self.config.generation_timeout,
            self.config.fallback_lines(),
        )
        .await
    }

    /// Queue the reaction line, emit the resolving transition, and drain the
    /// narration before the caller moves on.
    async fn narrate_and_resolve(
        &self,
        rx: &mut watch::Receiver<GameState>,
        line: String,
        compatibility: Option<i64>,
        winning_attribute: Option<String>,
        target: GamePhase,
    ) {
        let speaker = display_name(&self.room.latest());
        self.audio.enqueue(line.clone(), SpeakerChannel::Dater);

        self.act(
            rx,
            Action::AppendReaction {
                speaker,
                text: line,
                compatibility,
                winning_attribute,
            },
            move |s| s.phase == target || s.phase.is_terminal(),
        )
        .await;

        if timeout(self.config.narration_wait_cap, self.audio.wait_for_idle())
            .await
            .is_err()
        {
            warn!(room = %self.room.code(), "narration overran its cap; moving on");
        }
    }

    /// Send one action and wait until the broadcast state satisfies `done`.
    async fn act(
        &self,
        rx: &mut watch::Receiver<GameState>,
        action: Action,
        done: impl FnMut(&GameState) -> bool,
    ) -> GameState {
        self.room.act(self.conn, action);
        match timeout(ACTOR_SETTLE, rx.wait_for(done)).await {
            Ok(Ok(state)) => state.clone(),
            _ => {
                warn!(room = %self.room.code(), "room did not settle after an action");
                self.room.latest()
            }
        }
    }
}

fn display_name(state: &GameState) -> String {
    let name = state.dater.name.trim();
    if name.is_empty() {
        "Your date".to_owned()
    } else {
        name.to_owned()
    }
}

/// Popular answers nudge the date's mood further; the reducer clamps the
/// result to `[0, 100]`.
fn next_compatibility(current: u8, winner_weight: f32, total_weight: f32) -> i64 {
    let share = if total_weight > 0.0 {
        (winner_weight / total_weight).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let delta = (share * 10.0).round() as i64 - 2;
    i64::from(current) + delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use futures::future::BoxFuture;
    use tokio::sync::mpsc;

    use crate::{
        engine::{
            audio::{VoiceBackend, VoiceError},
            narrator::{ExactMatchGrouper, GenerationError},
        },
        room::{self, RoomHandle},
    };

    /// Echoes the winning attribute back and records every prompt it saw.
    struct EchoGenerator {
        prompts: Arc<Mutex<Vec<ReactionPrompt>>>,
    }

    impl EchoGenerator {
        fn new() -> (Arc<Self>, Arc<Mutex<Vec<ReactionPrompt>>>) {
            let prompts = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    prompts: prompts.clone(),
                }),
                prompts,
            )
        }
    }

    impl LineGenerator for EchoGenerator {
        fn generate(
            &self,
            prompt: &ReactionPrompt,
        ) -> BoxFuture<'static, Result<String, GenerationError>> {
            self.prompts.lock().unwrap().push(prompt.clone());
            let line = format!("You said {}?!", prompt.winning_attribute);
            Box::pin(async move { Ok(line) })
        }
    }

    /// Instant voice that records what it spoke, in order.
    struct RecordingVoice {
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingVoice {
        fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
            let spoken = Arc::new(Mutex::new(Vec::new()));
            (
                Arc::new(Self {
                    spoken: spoken.clone(),
                }),
                spoken,
            )
        }
    }

    impl VoiceBackend for RecordingVoice {
        fn speak(
            &self,
            text: &str,
            _channel: SpeakerChannel,
        ) -> BoxFuture<'static, Result<(), VoiceError>> {
            self.spoken.lock().unwrap().push(text.to_owned());
            Box::pin(async { Ok(()) })
        }
    }

    async fn started_room(
        code: &str,
        max_rounds: u32,
        players: &[(&str, &str)],
    ) -> (RoomHandle, Uuid) {
        let handle = room::spawn(code.into(), max_rounds, None).await;
        let host_conn = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.attach(host_conn, tx);

        for (id, name) in players {
            let conn = if *id == players[0].0 {
                host_conn
            } else {
                Uuid::new_v4()
            };
            handle.act(
                conn,
                Action::Join {
                    player_id: (*id).to_owned(),
                    name: (*name).to_owned(),
                },
            );
        }
        handle.act(
            host_conn,
            Action::StartGame {
                starting_stats_mode: false,
                tutorial: false,
            },
        );

        // Drain the broadcasts so the writer channel does not pile up.
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        (handle, host_conn)
    }

    fn orchestrator(
        handle: &RoomHandle,
        conn: Uuid,
        generator: Arc<dyn LineGenerator>,
        voice: Arc<dyn VoiceBackend>,
    ) -> Orchestrator {
        let audio = AudioQueue::new(voice, Duration::from_secs(30));
        Orchestrator::new(
            handle.clone(),
            conn,
            audio,
            generator,
            Arc::new(ExactMatchGrouper),
            AppConfig::default(),
        )
        .with_wheel(SelectionWheel::seeded(17))
    }

    #[tokio::test(start_paused = true)]
    async fn single_player_game_skips_the_wheel_and_reaches_ended() {
        let (handle, conn) = started_room("SOLO", 4, &[("ada", "Ada")]).await;
        handle.act(
            conn,
            Action::SubmitAttribute {
                player_id: "ada".into(),
                text: "glow in the dark minigolf".into(),
            },
        );

        let (generator, prompts) = EchoGenerator::new();
        let (voice, _) = RecordingVoice::new();
        orchestrator(&handle, conn, generator, voice).run().await;

        let state = handle.latest();
        assert_eq!(state.phase, GamePhase::Ended);
        assert!(state.plot_twist_completed);

        // Round one resolved on the literal answer, no wheel involved.
        let seen = prompts.lock().unwrap();
        assert_eq!(seen[0].winning_attribute, "glow in the dark minigolf");
        assert!(
            state
                .conversation
                .iter()
                .any(|m| m.text == "You said glow in the dark minigolf?!")
        );
        assert!(state.conversation.iter().any(|m| m.text == PLOT_TWIST_PROMPT));
    }

    #[tokio::test(start_paused = true)]
    async fn competing_answers_go_through_the_wheel() {
        let (handle, conn) = started_room("DUEL", 2, &[("ada", "Ada"), ("bob", "Bob")]).await;
        handle.act(
            conn,
            Action::SubmitAttribute {
                player_id: "ada".into(),
                text: "karaoke".into(),
            },
        );
        handle.act(
            conn,
            Action::SubmitAttribute {
                player_id: "bob".into(),
                text: "tango".into(),
            },
        );

        let (generator, prompts) = EchoGenerator::new();
        let (voice, _) = RecordingVoice::new();
        orchestrator(&handle, conn, generator, voice).run().await;

        let state = handle.latest();
        assert_eq!(state.phase, GamePhase::Ended);
        assert!(!state.plot_twist_completed, "budget 2 has no twist round");

        // The reaction was generated for a drawn winner, one of the answers.
        let seen = prompts.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(["karaoke", "tango"].contains(&seen[0].winning_attribute.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn wrap_up_is_heard_before_the_game_ends() {
        let (handle, conn) = started_room("WRAP", 2, &[("ada", "Ada")]).await;
        handle.act(
            conn,
            Action::SubmitAttribute {
                player_id: "ada".into(),
                text: "stargazing".into(),
            },
        );

        let (generator, _) = EchoGenerator::new();
        let (voice, spoken) = RecordingVoice::new();

        // Capture what had been spoken at the moment the game ended.
        let mut watcher = handle.subscribe();
        let spoken_at_end = spoken.clone();
        let at_end = tokio::spawn(async move {
            let _ = watcher.wait_for(|s| s.phase == GamePhase::Ended).await;
            spoken_at_end.lock().unwrap().clone()
        });

        orchestrator(&handle, conn, generator, voice).run().await;

        let heard = at_end.await.unwrap();
        for line in WRAP_UP_LINES {
            assert!(heard.contains(&line.to_owned()), "missing {line:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_rounds_resolve_with_a_fallback() {
        let (handle, conn) = started_room("QUIET", 2, &[("ada", "Ada")]).await;

        let (generator, prompts) = EchoGenerator::new();
        let (voice, _) = RecordingVoice::new();
        orchestrator(&handle, conn, generator, voice).run().await;

        let state = handle.latest();
        assert_eq!(state.phase, GamePhase::Ended);
        assert_eq!(
            prompts.lock().unwrap()[0].winning_attribute,
            "an awkward silence"
        );
    }
}
