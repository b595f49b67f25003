//! Integration tests for the `SpeechOrchestrator` state machine.
//!
//! These tests drive the orchestrator through its session lifecycle using
//! fake backends. No audio hardware, speech engine, or network access is
//! required: the fakes record what they are asked to do and report playback
//! signals on demand.
//!
//! # What is tested
//!
//! - Remote success, natural completion, single `Ended`
//! - Supersession mid-playback and of an in-flight request (stale response)
//! - Remote failure → local fallback with voice matching, exactly once
//! - Player failure counts as a remote failure
//! - Local failure abandons the utterance silently
//! - Duplicate suppression on trimmed text
//! - `stop()` / `teardown()` idempotence and resource release
//! - Late signals from superseded sessions are ignored
//! - Blocking backend calls (voice listing, opening the output device) run
//!   off the runtime workers and outside the state lock
//! - `speak` from a thread outside the runtime

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::Duration;

use async_trait::async_trait;
use parley_voice::{
    AudioFormat, AudioPlayer, AudioResource, Backend, BackendSignal, LocalSpeechEngine,
    LocalUtterance, LocalVoice, OrchestratorOptions, PlaybackEvent, RemoteSynthesizer,
    SessionPhase, SignalSender, SpeechBackends, SpeechOrchestrator, VoiceError,
};
use tokio::sync::{Notify, mpsc};

// ── Fake backends ──────────────────────────────────────────────────

/// Holds a synchronous backend call until the test releases it.
///
/// Records whether the call was entered and whether it gave up waiting, which
/// happens when the caller blocks the thread the test needs to release it.
#[derive(Default)]
struct BlockingGate {
    release: Mutex<Option<std_mpsc::Receiver<()>>>,
    entered: AtomicBool,
    timed_out: AtomicBool,
}

impl BlockingGate {
    fn arm(&self) -> std_mpsc::Sender<()> {
        let (tx, rx) = std_mpsc::channel();
        *self.release.lock().unwrap() = Some(rx);
        tx
    }

    fn pass(&self) {
        self.entered.store(true, Ordering::SeqCst);
        let Some(rx) = self.release.lock().unwrap().take() else {
            return;
        };
        if rx.recv_timeout(Duration::from_secs(2)).is_err() {
            self.timed_out.store(true, Ordering::SeqCst);
        }
    }

    fn entered(&self) -> bool {
        self.entered.load(Ordering::SeqCst)
    }

    fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy)]
enum Reply {
    Audio,
    Fail,
}

struct Step {
    reply: Reply,
    gate: Option<Arc<Notify>>,
}

/// Remote synthesizer with a scripted reply per call. Unscripted calls
/// succeed immediately.
#[derive(Default)]
struct FakeRemote {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<(String, Option<String>, AudioFormat)>>,
    released: Arc<AtomicUsize>,
}

impl FakeRemote {
    fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(Step { reply, gate: None });
    }

    /// Script a reply that is held back until the returned gate is notified.
    fn push_gated(&self, reply: Reply) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script.lock().unwrap().push_back(Step {
            reply,
            gate: Some(Arc::clone(&gate)),
        });
        gate
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _, _)| text.clone())
            .collect()
    }

    fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSynthesizer for FakeRemote {
    async fn synthesize(
        &self,
        text: &str,
        voice_hint: Option<&str>,
        format: AudioFormat,
    ) -> Result<AudioResource, VoiceError> {
        self.requests.lock().unwrap().push((
            text.to_string(),
            voice_hint.map(str::to_string),
            format,
        ));
        let step = self.script.lock().unwrap().pop_front();
        let step = step.unwrap_or(Step {
            reply: Reply::Audio,
            gate: None,
        });

        if let Some(gate) = step.gate {
            gate.notified().await;
        }

        match step.reply {
            Reply::Audio => {
                let released = Arc::clone(&self.released);
                Ok(AudioResource::new(vec![0u8; 32], format.mime()).with_release_hook(move || {
                    released.fetch_add(1, Ordering::SeqCst);
                }))
            }
            Reply::Fail => Err(VoiceError::RemoteSynthesis("HTTP 503 for /tts".into())),
        }
    }
}

/// Player that reports `Started` as soon as it is asked to play.
#[derive(Default)]
struct FakePlayer {
    fail: AtomicBool,
    prepare_gate: BlockingGate,
    complete_immediately: AtomicBool,
    plays: Mutex<Vec<SignalSender>>,
    stops: AtomicUsize,
}

impl FakePlayer {
    fn plays(&self) -> usize {
        self.plays.lock().unwrap().len()
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Report a signal for the most recent `play`.
    fn signal(&self, signal: BackendSignal) {
        let plays = self.plays.lock().unwrap();
        plays.last().expect("nothing played").send(signal);
    }

    fn sender(&self, index: usize) -> SignalSender {
        self.plays.lock().unwrap()[index].clone()
    }
}

impl AudioPlayer for FakePlayer {
    fn prepare(&self) -> Result<(), VoiceError> {
        self.prepare_gate.pass();
        Ok(())
    }

    fn play(&self, _resource: &AudioResource, signals: SignalSender) -> Result<(), VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Playback("no output device".into()));
        }
        signals.send(BackendSignal::Started);
        if self.complete_immediately.load(Ordering::SeqCst) {
            signals.send(BackendSignal::Completed);
        }
        self.plays.lock().unwrap().push(signals);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Local engine with a fixed voice list.
struct FakeEngine {
    voices: Vec<LocalVoice>,
    voices_gate: BlockingGate,
    fail: AtomicBool,
    auto_start: AtomicBool,
    spoken: Mutex<Vec<(LocalUtterance, SignalSender)>>,
    cancels: AtomicUsize,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            voices: vec![voice("en-us", "Alice"), voice("en-gb", "Bob")],
            voices_gate: BlockingGate::default(),
            fail: AtomicBool::new(false),
            auto_start: AtomicBool::new(true),
            spoken: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        }
    }
}

impl FakeEngine {
    fn spoken(&self) -> Vec<LocalUtterance> {
        self.spoken
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .collect()
    }

    fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    fn signal(&self, signal: BackendSignal) {
        let spoken = self.spoken.lock().unwrap();
        spoken.last().expect("nothing spoken").1.send(signal);
    }
}

impl LocalSpeechEngine for FakeEngine {
    fn cancel_all(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn voices(&self) -> Vec<LocalVoice> {
        self.voices_gate.pass();
        self.voices.clone()
    }

    fn speak(&self, utterance: LocalUtterance, signals: SignalSender) -> Result<(), VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::LocalSynthesis("engine unavailable".into()));
        }
        if self.auto_start.load(Ordering::SeqCst) {
            signals.send(BackendSignal::Started);
        }
        self.spoken.lock().unwrap().push((utterance, signals));
        Ok(())
    }
}

fn voice(id: &str, name: &str) -> LocalVoice {
    LocalVoice {
        id: id.into(),
        name: name.into(),
        language: id.into(),
    }
}

// ── Harness ────────────────────────────────────────────────────────

struct Harness {
    speech: SpeechOrchestrator,
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
    remote: Arc<FakeRemote>,
    engine: Arc<FakeEngine>,
    player: Arc<FakePlayer>,
}

fn harness() -> Harness {
    let remote = Arc::new(FakeRemote::default());
    let engine = Arc::new(FakeEngine::default());
    let player = Arc::new(FakePlayer::default());
    let backends = SpeechBackends {
        remote: Arc::clone(&remote) as Arc<dyn RemoteSynthesizer>,
        local: Arc::clone(&engine) as Arc<dyn LocalSpeechEngine>,
        player: Arc::clone(&player) as Arc<dyn AudioPlayer>,
    };
    let options = OrchestratorOptions {
        format: AudioFormat::Mp3,
        local_rate: 1.25,
    };
    let (speech, events) = SpeechOrchestrator::new(backends, options);
    Harness {
        speech,
        events,
        remote,
        engine,
        player,
    }
}

impl Harness {
    /// Speak and wait for the session task (remote call + fallback) to finish.
    async fn speak(&self, text: &str, hint: Option<&str>) {
        self.speech
            .speak(text, hint)
            .expect("utterance should be accepted")
            .await
            .expect("session task panicked");
    }

    async fn next_event(&mut self) -> PlaybackEvent {
        tokio::time::timeout(Duration::from_secs(2), self.events.recv())
            .await
            .expect("timed out waiting for playback event")
            .expect("event channel closed")
    }

    /// Let queued signals drain, then assert nothing was emitted.
    async fn assert_quiet(&mut self) {
        settle().await;
        assert!(
            self.events.try_recv().is_err(),
            "unexpected playback event"
        );
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Poll `condition` from the test task until it holds.
async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

// ── Remote path ────────────────────────────────────────────────────

#[tokio::test]
async fn remote_success_plays_and_ends_once() {
    let mut h = harness();

    h.speak("  Hello there.  ", Some("nova")).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    assert!(h.speech.is_active());
    assert_eq!(h.speech.backend(), Some(Backend::Remote));
    assert_eq!(h.speech.phase(), Some(SessionPhase::PlayingRemote));

    h.player.signal(BackendSignal::Completed);
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);
    assert!(!h.speech.is_active());
    assert_eq!(h.remote.released(), 1);

    let requests = h.remote.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![(
            "Hello there.".to_string(),
            Some("nova".to_string()),
            AudioFormat::Mp3
        )]
    );
    assert!(h.engine.spoken().is_empty());

    h.assert_quiet().await;
}

#[tokio::test]
async fn instant_playback_completes_cleanly() {
    let mut h = harness();
    h.player.complete_immediately.store(true, Ordering::SeqCst);

    h.speak("Short.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);
    assert!(!h.speech.is_active());
    assert_eq!(h.remote.released(), 1);
}

#[tokio::test]
async fn pause_ends_session_and_later_completion_is_ignored() {
    let mut h = harness();

    h.speak("Pause me.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);

    h.player.signal(BackendSignal::Paused);
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);

    h.player.signal(BackendSignal::Completed);
    h.assert_quiet().await;
    assert_eq!(h.remote.released(), 1);
}

#[tokio::test]
async fn newer_utterance_supersedes_playing_one() {
    let mut h = harness();

    h.speak("First answer.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);

    let gate = h.remote.push_gated(Reply::Audio);
    let second = h.speech.speak("Second answer.", None).unwrap();

    // Supersession is synchronous: the old audio is halted and released
    // before speak() returns.
    assert!(h.player.stops() >= 1);
    assert_eq!(h.remote.released(), 1);
    assert!(h.speech.is_active());
    assert_eq!(h.speech.phase(), Some(SessionPhase::RequestingRemote));
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);

    gate.notify_one();
    second.await.unwrap();
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    assert_eq!(h.remote.texts(), vec!["First answer.", "Second answer."]);
    assert_eq!(h.player.plays(), 2);
}

#[tokio::test]
async fn stale_remote_response_is_released_unplayed() {
    let mut h = harness();

    let gate = h.remote.push_gated(Reply::Audio);
    let first = h.speech.speak("Slow one.", None).unwrap();
    // Let the first session reach its remote call.
    settle().await;

    h.speak("Fast one.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);

    gate.notify_one();
    first.await.unwrap();

    assert_eq!(h.player.plays(), 1, "stale audio must not play");
    assert_eq!(h.remote.released(), 1, "stale audio must be released");
    assert_eq!(h.speech.backend(), Some(Backend::Remote));
    h.assert_quiet().await;
}

#[tokio::test]
async fn superseded_session_never_requests() {
    let mut h = harness();

    let first = h.speech.speak("One.", None).unwrap();
    let second = h.speech.speak("Two.", None).unwrap();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(h.remote.texts(), vec!["Two."]);
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    h.assert_quiet().await;
}

// ── Local fallback ─────────────────────────────────────────────────

#[tokio::test]
async fn remote_failure_falls_back_to_local_once() {
    let mut h = harness();
    h.remote.push(Reply::Fail);

    h.speak("Fallback please.", Some("  bob ")).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    assert_eq!(h.speech.backend(), Some(Backend::Local));
    assert_eq!(h.speech.phase(), Some(SessionPhase::PlayingLocal));

    let spoken = h.engine.spoken();
    assert_eq!(spoken.len(), 1);
    assert_eq!(spoken[0].text, "Fallback please.");
    assert_eq!(spoken[0].voice.as_ref().map(|v| v.id.as_str()), Some("en-gb"));
    assert!((spoken[0].rate - 1.25).abs() < f32::EPSILON);
    assert!(h.engine.cancels() >= 1, "queue must be cancelled before speaking");
    assert_eq!(h.remote.calls(), 1);
    assert_eq!(h.player.plays(), 0);

    h.engine.signal(BackendSignal::Completed);
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);
    assert!(!h.speech.is_active());
}

#[tokio::test]
async fn unmatched_hint_uses_engine_default_voice() {
    let mut h = harness();
    h.remote.push(Reply::Fail);

    h.speak("Who am I?", Some("Charlie")).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    assert_eq!(h.engine.spoken()[0].voice, None);
}

#[tokio::test]
async fn player_failure_counts_as_remote_failure() {
    let mut h = harness();
    h.player.fail.store(true, Ordering::SeqCst);

    h.speak("No speakers.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    assert_eq!(h.speech.backend(), Some(Backend::Local));
    assert_eq!(h.engine.spoken().len(), 1);
    assert_eq!(h.remote.released(), 1, "unplayable audio must be released");
}

#[tokio::test]
async fn local_failure_abandons_utterance() {
    let mut h = harness();
    h.remote.push(Reply::Fail);
    h.engine.fail.store(true, Ordering::SeqCst);

    h.speak("Nobody hears this.", None).await;
    assert!(!h.speech.is_active());
    assert_eq!(h.remote.calls(), 1);
    // Once before speaking, once when the session is released.
    assert_eq!(h.engine.cancels(), 2);
    h.assert_quiet().await;

    // Still counts as accepted.
    assert_eq!(h.speech.last_accepted().as_deref(), Some("Nobody hears this."));
    assert!(h.speech.speak("Nobody hears this.", None).is_none());
}

#[tokio::test]
async fn unstarted_local_session_superseded_without_ended() {
    let mut h = harness();
    h.remote.push(Reply::Fail);
    h.engine.auto_start.store(false, Ordering::SeqCst);

    h.speak("Quiet start.", None).await;
    assert_eq!(h.speech.phase(), Some(SessionPhase::RequestingLocal));

    let cancels = h.engine.cancels();
    h.remote.push_gated(Reply::Audio);
    let _next = h.speech.speak("Next.", None).unwrap();
    assert!(h.engine.cancels() > cancels);
    h.assert_quiet().await;
}

// ── Acceptance ─────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_and_blank_utterances_are_ignored() {
    let h = harness();

    assert!(h.speech.speak("   ", None).is_none());
    assert!(h.speech.speak("", Some("nova")).is_none());

    h.speak("Hello", None).await;
    assert!(h.speech.speak("Hello", None).is_none());
    assert!(h.speech.speak("  Hello\n", None).is_none());
    assert!(h.speech.speak("Hello", Some("other")).is_none());
    assert_eq!(h.remote.calls(), 1);
    assert_eq!(h.speech.last_accepted().as_deref(), Some("Hello"));

    h.speak("hello", None).await;
    assert_eq!(h.remote.calls(), 2);
}

#[tokio::test]
async fn repeat_while_first_request_pending_is_ignored() {
    let mut h = harness();

    let gate = h.remote.push_gated(Reply::Audio);
    let first = h.speech.speak("Hi", None).unwrap();
    assert!(h.speech.speak("Hi", None).is_none());
    settle().await;
    assert!(h.speech.speak(" Hi ", None).is_none());

    gate.notify_one();
    first.await.unwrap();
    assert_eq!(h.remote.calls(), 1);
    assert_eq!(h.player.plays(), 1);
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    h.assert_quiet().await;
}

#[tokio::test]
async fn stop_does_not_reset_duplicate_suppression() {
    let mut h = harness();

    h.speak("Once.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    h.speech.stop();
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);

    assert!(h.speech.speak("Once.", None).is_none());
}

// ── Stop & teardown ────────────────────────────────────────────────

#[tokio::test]
async fn stop_is_idempotent() {
    let mut h = harness();

    h.speech.stop();
    h.assert_quiet().await;

    h.speak("Talking.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);

    h.speech.stop();
    h.speech.stop();
    assert!(!h.speech.is_active());
    assert_eq!(h.speech.phase(), None);
    assert_eq!(h.player.stops(), 1);
    assert_eq!(h.remote.released(), 1);
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);
    h.assert_quiet().await;
}

#[tokio::test]
async fn stop_during_request_discards_late_audio() {
    let mut h = harness();

    let gate = h.remote.push_gated(Reply::Audio);
    let task = h.speech.speak("Never mind.", None).unwrap();
    settle().await;

    h.speech.stop();
    assert!(!h.speech.is_active());

    gate.notify_one();
    task.await.unwrap();
    assert_eq!(h.player.plays(), 0);
    assert_eq!(h.remote.released(), 1);
    h.assert_quiet().await;
}

#[tokio::test]
async fn late_signals_from_superseded_session_are_ignored() {
    let mut h = harness();

    h.speak("Old.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);
    let old = h.player.sender(0);

    h.remote.push_gated(Reply::Audio);
    let _new = h.speech.speak("New.", None).unwrap();
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);

    old.send(BackendSignal::Started);
    old.send(BackendSignal::Completed);
    h.assert_quiet().await;
    assert!(h.speech.is_active(), "new session must survive old signals");
    assert_ne!(h.speech.current_session(), Some(old.session()));
}

#[tokio::test]
async fn teardown_releases_and_rejects_further_speech() {
    let mut h = harness();

    h.speak("Goodbye.", None).await;
    assert_eq!(h.next_event().await, PlaybackEvent::Started);

    h.speech.teardown();
    assert_eq!(h.next_event().await, PlaybackEvent::Ended);
    assert_eq!(h.remote.released(), 1);
    assert!(!h.speech.is_active());

    h.speech.teardown();
    assert!(h.speech.speak("Anyone there?", None).is_none());
    assert_eq!(h.remote.calls(), 1);
    h.assert_quiet().await;
}

#[tokio::test]
async fn dropping_orchestrator_tears_down() {
    let Harness {
        speech,
        mut events,
        remote,
        player,
        ..
    } = harness();

    speech.speak("Drop me.", None).unwrap().await.unwrap();
    let started = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
    assert_eq!(started.unwrap(), Some(PlaybackEvent::Started));

    drop(speech);
    assert_eq!(player.stops(), 1);
    assert_eq!(remote.released(), 1);

    let ended = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
    assert_eq!(ended.unwrap(), Some(PlaybackEvent::Ended));
}

// ── Threads and blocking backends ──────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn speak_from_thread_outside_runtime() {
    let Harness {
        speech,
        mut events,
        remote,
        ..
    } = harness();
    let speech = Arc::new(speech);

    let from_thread = Arc::clone(&speech);
    let accepted = std::thread::spawn(move || {
        from_thread
            .speak("Hello from another thread.", None)
            .is_some()
    })
    .join()
    .expect("speak panicked outside the runtime");
    assert!(accepted);

    let started = tokio::time::timeout(Duration::from_secs(2), events.recv()).await;
    assert_eq!(started.unwrap(), Some(PlaybackEvent::Started));
    assert_eq!(remote.texts(), vec!["Hello from another thread."]);
}

#[tokio::test]
async fn voice_listing_runs_off_the_runtime() {
    let mut h = harness();
    h.remote.push(Reply::Fail);
    let release = h.engine.voices_gate.arm();

    let task = h.speech.speak("Slow voices.", Some("bob")).unwrap();
    wait_until(|| h.engine.voices_gate.entered()).await;

    // The listing is still blocked; the state lock must be free.
    h.speech.stop();
    assert!(!h.speech.is_active());

    release.send(()).unwrap();
    task.await.unwrap();
    assert!(!h.engine.voices_gate.timed_out(), "voice listing blocked the runtime");
    assert!(h.engine.spoken().is_empty(), "stopped utterance must not be spoken");
    h.assert_quiet().await;
}

#[tokio::test]
async fn stop_while_output_device_opens_discards_audio() {
    let mut h = harness();
    let release = h.player.prepare_gate.arm();

    let task = h.speech.speak("Opening speakers.", None).unwrap();
    wait_until(|| h.player.prepare_gate.entered()).await;

    h.speech.stop();
    assert!(!h.speech.is_active());

    release.send(()).unwrap();
    task.await.unwrap();
    assert!(!h.player.prepare_gate.timed_out(), "opening output blocked the runtime");
    assert_eq!(h.player.plays(), 0);
    assert_eq!(h.remote.released(), 1);
    h.assert_quiet().await;
}
