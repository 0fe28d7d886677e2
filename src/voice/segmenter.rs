//! Turn segmentation
//!
//! Decides, from a stream of interim/final transcript events and recognizer
//! lifecycle signals, when a spoken utterance is done and should be
//! committed. Exactly one committed-utterance event fires per spoken turn.
//!
//! The commit path is two-stage on purpose. A recognizer pause arms a
//! *continuation* timer that absorbs short mid-sentence pauses the backend
//! misreports as end-of-speech; only when that window passes quietly does
//! the independent *final-commit* timer arm, a settle window after the
//! backend's own end event. The final firing commits only if the governing
//! session has actually gone inactive — anything else is a stale timer and
//! is discarded without a trace. Both windows are separate config knobs.
//!
//! All entry points are safe under any interleaving of recognizer
//! callbacks and timer firings: timers are epoch-guarded, so a cancelled
//! or superseded timer that still reaches its body is a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SegmenterConfig;

/// Events surfaced to the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmenterEvent {
    /// Live preview; may fire many times per turn
    Interim(String),

    /// One spoken turn is complete — fired exactly once per turn
    Utterance(String),

    /// Listening state changed
    Listening(bool),

    /// Recognition failed; no commit follows for this session
    Error(String),
}

/// Segmenter state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmenterState {
    /// No session
    Idle,
    /// Session live, accumulating speech
    Listening,
    /// Recognizer reported a pause; continuation window running
    PendingPause,
    /// Continuation window passed; final-commit window running
    Committing,
}

/// Shared liveness flag for one recognition session.
///
/// The router flips it off when the backend session ends; the final-commit
/// timer reads it to tell a real commit from a stale firing.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    active: Arc<AtomicBool>,
}

impl SessionHandle {
    /// New handle, active
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the session is still live
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Mark the session as ended
    pub fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

struct Inner {
    state: SegmenterState,
    accumulated: String,
    speech_observed: bool,
    session: Option<SessionHandle>,
    timing: SegmenterConfig,
    events: mpsc::UnboundedSender<SegmenterEvent>,

    // Epoch guards: arming bumps the epoch and captures it; cancelling
    // bumps it again. A timer whose captured epoch no longer matches is
    // stale, even if it slipped past the abort.
    continuation_epoch: u64,
    final_epoch: u64,
    continuation_timer: Option<JoinHandle<()>>,
    final_timer: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_continuation(&mut self) {
        self.continuation_epoch += 1;
        if let Some(handle) = self.continuation_timer.take() {
            handle.abort();
        }
    }

    fn cancel_final(&mut self) {
        self.final_epoch += 1;
        if let Some(handle) = self.final_timer.take() {
            handle.abort();
        }
    }

    fn clear_buffer(&mut self) {
        self.accumulated.clear();
        self.speech_observed = false;
    }

    fn emit(&self, event: SegmenterEvent) {
        let _ = self.events.send(event);
    }

    /// Transition to idle, emitting the listening change when it is one
    fn go_idle(&mut self) {
        if self.state != SegmenterState::Idle {
            self.state = SegmenterState::Idle;
            self.emit(SegmenterEvent::Listening(false));
        }
    }
}

/// The recognition-side turn segmentation state machine
#[derive(Clone)]
pub struct TurnSegmenter {
    inner: Arc<Mutex<Inner>>,
}

impl TurnSegmenter {
    /// Create a segmenter that reports on `events`
    #[must_use]
    pub fn new(timing: SegmenterConfig, events: mpsc::UnboundedSender<SegmenterEvent>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: SegmenterState::Idle,
                accumulated: String::new(),
                speech_observed: false,
                session: None,
                timing,
                events,
                continuation_epoch: 0,
                final_epoch: 0,
                continuation_timer: None,
                final_timer: None,
            })),
        }
    }

    /// Begin a fresh session.
    ///
    /// Any previous session's timers are cancelled and its buffer dropped;
    /// the caller is responsible for having terminated the old backend
    /// session first (sessions replace serially, never overlap).
    pub fn begin_session(&self, session: SessionHandle) {
        let mut inner = self.inner.lock().expect("segmenter lock");
        inner.cancel_continuation();
        inner.cancel_final();
        inner.clear_buffer();
        inner.session = Some(session);
        inner.state = SegmenterState::Listening;
        inner.emit(SegmenterEvent::Listening(true));
        tracing::debug!("turn segmenter listening");
    }

    /// Interim transcript fragment from the recognizer.
    ///
    /// Proof that speech is continuing: a pending continuation window is
    /// cancelled and the machine returns to plain listening. The fragment
    /// is surfaced as a preview but never enters the utterance buffer.
    pub fn on_interim(&self, text: &str) {
        let mut inner = self.inner.lock().expect("segmenter lock");
        match inner.state {
            SegmenterState::Idle => return,
            SegmenterState::PendingPause => {
                inner.cancel_continuation();
                inner.state = SegmenterState::Listening;
            }
            SegmenterState::Listening | SegmenterState::Committing => {}
        }
        inner.speech_observed = true;
        inner.emit(SegmenterEvent::Interim(text.to_string()));
    }

    /// Final transcript fragment from the recognizer.
    ///
    /// Appended to the utterance buffer. Deliberately does not cancel a
    /// running continuation timer — a final segment can arrive as part of
    /// the very pause being evaluated.
    pub fn on_final(&self, text: &str) {
        let mut inner = self.inner.lock().expect("segmenter lock");
        if inner.state == SegmenterState::Idle {
            return;
        }

        let text = text.trim();
        if !text.is_empty() {
            if !inner.accumulated.is_empty() {
                inner.accumulated.push(' ');
            }
            inner.accumulated.push_str(text);
        }
        inner.speech_observed = true;

        let preview = inner.accumulated.clone();
        inner.emit(SegmenterEvent::Interim(preview));
    }

    /// The recognizer believes the speaker stopped.
    ///
    /// A fresh pause supersedes a stale one: any running continuation
    /// window restarts from now.
    pub fn on_pause(&self) {
        let mut inner = self.inner.lock().expect("segmenter lock");
        if inner.state == SegmenterState::Idle {
            return;
        }

        inner.cancel_continuation();
        inner.state = SegmenterState::PendingPause;

        inner.continuation_epoch += 1;
        let epoch = inner.continuation_epoch;
        let delay = inner.timing.continuation;
        let shared = Arc::clone(&self.inner);
        inner.continuation_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            continuation_elapsed(&shared, epoch);
        }));
    }

    /// The governing backend session ended.
    ///
    /// Deactivates the session handle so a pending final-commit window can
    /// trust the pause. A session that ends while plainly listening either
    /// starts pause evaluation (text pending) or goes idle (nothing said).
    pub fn on_session_end(&self) {
        let start_evaluation = {
            let mut inner = self.inner.lock().expect("segmenter lock");
            if let Some(session) = &inner.session {
                session.deactivate();
            }
            match inner.state {
                SegmenterState::Listening if inner.accumulated.trim().is_empty() => {
                    inner.go_idle();
                    false
                }
                SegmenterState::Listening => true,
                _ => false,
            }
        };

        // An end without a preceding pause signal still means the speaker
        // stopped; run the same two-stage evaluation.
        if start_evaluation {
            self.on_pause();
        }
    }

    /// Recognition error: cancel everything, no commit for this session
    pub fn on_error(&self, code: &str) {
        let mut inner = self.inner.lock().expect("segmenter lock");
        inner.cancel_continuation();
        inner.cancel_final();
        inner.clear_buffer();
        if let Some(session) = &inner.session {
            session.deactivate();
        }
        inner.emit(SegmenterEvent::Error(code.to_string()));
        inner.go_idle();
        tracing::debug!(code, "recognition error surfaced");
    }

    /// User-initiated stop: flush synchronously.
    ///
    /// Cancels both timers, captures whatever accumulated, and commits it
    /// immediately — manual stop is never slower than silence detection.
    /// Returns the committed text, if any. The caller must also terminate
    /// the backend session.
    pub fn stop(&self) -> Option<String> {
        let mut inner = self.inner.lock().expect("segmenter lock");
        inner.cancel_continuation();
        inner.cancel_final();

        let captured = inner.accumulated.trim().to_string();
        inner.clear_buffer();
        if let Some(session) = &inner.session {
            session.deactivate();
        }

        let committed = if captured.is_empty() {
            None
        } else {
            inner.emit(SegmenterEvent::Utterance(captured.clone()));
            Some(captured)
        };
        inner.go_idle();
        committed
    }

    /// Current state (for diagnostics and tests)
    #[must_use]
    pub fn state(&self) -> SegmenterState {
        self.inner.lock().expect("segmenter lock").state
    }
}

/// Continuation window elapsed without further speech
fn continuation_elapsed(shared: &Arc<Mutex<Inner>>, epoch: u64) {
    let mut inner = shared.lock().expect("segmenter lock");
    if inner.continuation_epoch != epoch || inner.state != SegmenterState::PendingPause {
        return; // superseded or cancelled after this timer was armed
    }
    inner.continuation_timer = None;

    if inner.accumulated.trim().is_empty() || !inner.speech_observed {
        // Nothing worth committing; fall back to listening while the
        // session lives, otherwise the turn is simply over.
        let still_active = inner.session.as_ref().is_some_and(SessionHandle::is_active);
        if still_active {
            inner.state = SegmenterState::Listening;
        } else {
            inner.clear_buffer();
            inner.go_idle();
        }
        return;
    }

    inner.state = SegmenterState::Committing;
    inner.cancel_final();
    let final_epoch = inner.final_epoch;
    let delay = inner.timing.final_commit;
    let shared = Arc::clone(shared);
    inner.final_timer = Some(tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        final_commit_elapsed(&shared, final_epoch);
    }));
}

/// Final-commit window elapsed: commit, or discard as stale
fn final_commit_elapsed(shared: &Arc<Mutex<Inner>>, epoch: u64) {
    let mut inner = shared.lock().expect("segmenter lock");
    if inner.final_epoch != epoch {
        return;
    }
    inner.final_timer = None;

    let session_over = inner
        .session
        .as_ref()
        .is_none_or(|session| !session.is_active());
    if !session_over {
        // The backend session sprang back to life; this firing is stale.
        // Keep the buffer — the next pause cycle evaluates it again.
        if inner.state == SegmenterState::Committing {
            inner.state = SegmenterState::Listening;
        }
        return;
    }

    let text = inner.accumulated.trim().to_string();
    inner.clear_buffer();
    if !text.is_empty() {
        inner.emit(SegmenterEvent::Utterance(text));
    }
    inner.go_idle();
}
