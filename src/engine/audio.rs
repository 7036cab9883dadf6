//! Sequential narration queue.
//!
//! All spoken lines go through one queue so concurrent requests come out as a
//! single audible stream: strict FIFO, at most one request in flight, and a
//! watch-based idle signal the orchestrator blocks on between phases.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::timeout,
};
use tracing::warn;

/// Which voice a line is spoken with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerChannel {
    /// The date avatar's voice.
    Dater,
    /// The out-of-character narrator voice.
    Narrator,
}

/// Errors surfaced by a voice backend.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Backend cannot be reached or is missing credentials.
    #[error("voice backend unavailable: {0}")]
    Unavailable(String),
    /// Playback started but failed partway.
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Voice synthesis collaborator; the returned future resolves when playback of
/// the line has finished.
pub trait VoiceBackend: Send + Sync + 'static {
    /// Speak one line on the given channel.
    fn speak(&self, text: &str, channel: SpeakerChannel) -> BoxFuture<'static, Result<(), VoiceError>>;
}

/// Backend that plays nothing, instantly. Used in tests and when no voice
/// credentials are configured.
pub struct SilentVoice;

impl VoiceBackend for SilentVoice {
    fn speak(&self, _text: &str, _channel: SpeakerChannel) -> BoxFuture<'static, Result<(), VoiceError>> {
        Box::pin(async { Ok(()) })
    }
}

/// Signals handed back for one enqueued line.
///
/// Both receivers error out instead of resolving when the queue is stopped
/// before the line plays; callers treat that as an abandoned no-op.
pub struct Enqueued {
    /// Resolves when the line is dequeued and playback begins.
    pub started: oneshot::Receiver<()>,
    /// Resolves when playback finishes (or errors out and is skipped).
    pub finished: oneshot::Receiver<()>,
}

struct SpeechRequest {
    text: String,
    channel: SpeakerChannel,
    started: oneshot::Sender<()>,
    finished: oneshot::Sender<()>,
}

enum QueueCommand {
    Play(SpeechRequest),
    Stop,
}

#[derive(Clone)]
/// Handle to the narration queue worker.
pub struct AudioQueue {
    tx: mpsc::UnboundedSender<QueueCommand>,
    outstanding: Arc<watch::Sender<usize>>,
    idle_rx: watch::Receiver<usize>,
}

impl AudioQueue {
    /// Spawn the queue worker over the given backend. Each item's playback is
    /// capped at `playback_cap` so a stalled backend cannot freeze the game.
    pub fn new(voice: Arc<dyn VoiceBackend>, playback_cap: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = watch::channel(0usize);
        let outstanding = Arc::new(count_tx);

        tokio::spawn(run_worker(voice, playback_cap, rx, outstanding.clone()));

        Self {
            tx,
            outstanding,
            idle_rx: count_rx,
        }
    }

    /// Queue one line for playback.
    pub fn enqueue(&self, text: impl Into<String>, channel: SpeakerChannel) -> Enqueued {
        let (started_tx, started_rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();

        self.outstanding.send_modify(|count| *count += 1);
        let request = SpeechRequest {
            text: text.into(),
            channel,
            started: started_tx,
            finished: finished_tx,
        };
        if self.tx.send(QueueCommand::Play(request)).is_err() {
            // Worker gone; the dropped senders tell the caller the line was
            // abandoned.
            self.outstanding.send_modify(|count| *count = count.saturating_sub(1));
        }

        Enqueued {
            started: started_rx,
            finished: finished_rx,
        }
    }

    /// Resolve once nothing is queued or in flight. Resolves immediately when
    /// the queue is already idle.
    pub async fn wait_for_idle(&self) {
        let mut rx = self.idle_rx.clone();
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Halt any in-flight playback and drain the queue. Drained requests are
    /// abandoned, never resolved as success.
    pub fn stop(&self) {
        let _ = self.tx.send(QueueCommand::Stop);
    }
}

async fn run_worker(
    voice: Arc<dyn VoiceBackend>,
    playback_cap: Duration,
    mut rx: mpsc::UnboundedReceiver<QueueCommand>,
    outstanding: Arc<watch::Sender<usize>>,
) {
    let mut queue: VecDeque<SpeechRequest> = VecDeque::new();
    let settle_one = |outstanding: &watch::Sender<usize>| {
        outstanding.send_modify(|count| *count = count.saturating_sub(1));
    };
    let drain = |queue: &mut VecDeque<SpeechRequest>, outstanding: &watch::Sender<usize>| {
        for _ in queue.drain(..) {
            settle_one(outstanding);
        }
    };

    'next_item: loop {
        let request = match queue.pop_front() {
            Some(request) => request,
            None => match rx.recv().await {
                Some(QueueCommand::Play(request)) => request,
                Some(QueueCommand::Stop) => continue,
                None => break,
            },
        };

        let SpeechRequest {
            text,
            channel,
            started,
            finished,
        } = request;

        let _ = started.send(());
        let mut playback = Box::pin(timeout(playback_cap, voice.speak(&text, channel)));

        loop {
            tokio::select! {
                result = &mut playback => {
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => warn!(error = %err, "playback failed; skipping to next line"),
                        Err(_) => warn!(cap_ms = playback_cap.as_millis() as u64, "playback exceeded its cap; skipping to next line"),
                    }
                    let _ = finished.send(());
                    settle_one(&outstanding);
                    continue 'next_item;
                }
                command = rx.recv() => match command {
                    Some(QueueCommand::Play(next)) => queue.push_back(next),
                    Some(QueueCommand::Stop) => {
                        // Abandon the in-flight line (finished is dropped, not
                        // resolved) and drop everything queued behind it.
                        drop(playback);
                        drop(finished);
                        settle_one(&outstanding);
                        drain(&mut queue, &outstanding);
                        continue 'next_item;
                    }
                    None => {
                        drop(playback);
                        drop(finished);
                        settle_one(&outstanding);
                        drain(&mut queue, &outstanding);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Backend that records playback order and takes a little while per line.
    struct ScriptedVoice {
        events: Arc<Mutex<Vec<String>>>,
        line_duration: Duration,
        fail_on: Option<String>,
    }

    impl ScriptedVoice {
        fn new(line_duration: Duration) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            let voice = Arc::new(Self {
                events: events.clone(),
                line_duration,
                fail_on: None,
            });
            (voice, events)
        }
    }

    impl VoiceBackend for ScriptedVoice {
        fn speak(&self, text: &str, _channel: SpeakerChannel) -> BoxFuture<'static, Result<(), VoiceError>> {
            let events = self.events.clone();
            let duration = self.line_duration;
            let text = text.to_owned();
            let fail = self.fail_on.as_deref() == Some(text.as_str());
            Box::pin(async move {
                events.lock().unwrap().push(format!("begin:{text}"));
                sleep(duration).await;
                if fail {
                    return Err(VoiceError::Playback("scripted failure".into()));
                }
                events.lock().unwrap().push(format!("end:{text}"));
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn playback_is_strictly_fifo() {
        let (voice, events) = ScriptedVoice::new(Duration::from_millis(20));
        let queue = AudioQueue::new(voice, Duration::from_secs(5));

        let first = queue.enqueue("X", SpeakerChannel::Dater);
        let second = queue.enqueue("Y", SpeakerChannel::Narrator);

        first.finished.await.expect("first line finished");
        second.started.await.expect("second line started");
        queue.wait_for_idle().await;

        let log = events.lock().unwrap().clone();
        assert_eq!(log, vec!["begin:X", "end:X", "begin:Y", "end:Y"]);
    }

    #[tokio::test]
    async fn wait_for_idle_resolves_immediately_when_empty() {
        let (voice, _) = ScriptedVoice::new(Duration::from_millis(5));
        let queue = AudioQueue::new(voice, Duration::from_secs(5));

        timeout(Duration::from_millis(50), queue.wait_for_idle())
            .await
            .expect("idle wait on an empty queue must not block");
    }

    #[tokio::test]
    async fn stop_abandons_in_flight_and_queued_lines() {
        let (voice, events) = ScriptedVoice::new(Duration::from_secs(30));
        let queue = AudioQueue::new(voice, Duration::from_secs(60));

        let first = queue.enqueue("X", SpeakerChannel::Dater);
        let second = queue.enqueue("Y", SpeakerChannel::Dater);

        first.started.await.expect("first line started");
        queue.stop();

        // Neither line resolves as finished; the queue settles to idle.
        assert!(first.finished.await.is_err());
        assert!(second.started.await.is_err());
        assert!(second.finished.await.is_err());
        timeout(Duration::from_secs(1), queue.wait_for_idle())
            .await
            .expect("queue drains after stop");

        let log = events.lock().unwrap().clone();
        assert_eq!(log, vec!["begin:X"]);
    }

    #[tokio::test]
    async fn playback_errors_advance_the_queue() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let voice = Arc::new(ScriptedVoice {
            events: events.clone(),
            line_duration: Duration::from_millis(5),
            fail_on: Some("X".into()),
        });
        let queue = AudioQueue::new(voice, Duration::from_secs(5));

        let first = queue.enqueue("X", SpeakerChannel::Dater);
        let second = queue.enqueue("Y", SpeakerChannel::Dater);

        // The failed line still resolves its finish signal so callers unblock.
        first.finished.await.expect("failed line is settled");
        second.finished.await.expect("next line plays");

        let log = events.lock().unwrap().clone();
        assert_eq!(log, vec!["begin:X", "begin:Y", "end:Y"]);
    }

    #[tokio::test]
    async fn stalled_playback_is_capped() {
        let (voice, _) = ScriptedVoice::new(Duration::from_secs(300));
        let queue = AudioQueue::new(voice, Duration::from_millis(50));

        let line = queue.enqueue("X", SpeakerChannel::Dater);
        timeout(Duration::from_secs(2), line.finished)
            .await
            .expect("cap fires")
            .expect("capped line is settled");
    }
}
