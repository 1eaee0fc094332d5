//! Session controller executor

use super::{SessionError, SessionUpdate, SessionView};
use crate::reveal::{RevealHandle, RevealScheduler};
use crate::state_machine::{
    transition, Effect, Event, Message, MessageId, MessageIdSequence, SessionContext,
    TransitionError, TurnState,
};
use crate::transport::{Request, Transport, TransportError};
use crate::upload::UploadFile;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// The one piece of background work a turn may have outstanding
#[derive(Debug, Default)]
enum ActiveOperation {
    #[default]
    None,
    Request(CancellationToken),
    Reveal(RevealHandle),
}

/// Drives turns against a transport.
///
/// Submits and Stop are applied synchronously. Results of background work
/// (request completion, reveal ticks, the stop grace timer) arrive as events
/// and are applied by [`SessionController::step`], which the owner must keep
/// polling while a turn is active.
pub struct SessionController<T: Transport + 'static> {
    context: SessionContext,
    state: TurnState,
    transport: Arc<T>,
    reveal: RevealScheduler,
    ids: MessageIdSequence,
    active: ActiveOperation,
    view_tx: watch::Sender<SessionView>,
    updates_tx: broadcast::Sender<SessionUpdate>,
    event_tx: mpsc::UnboundedSender<Event>,
    event_rx: mpsc::UnboundedReceiver<Event>,
}

impl<T: Transport + 'static> SessionController<T> {
    pub fn new(transport: T, reveal: RevealScheduler, context: SessionContext) -> Self {
        let (view_tx, _) = watch::channel(SessionView::default());
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            context,
            state: TurnState::Idle,
            transport: Arc::new(transport),
            reveal,
            ids: MessageIdSequence::new(),
            active: ActiveOperation::None,
            view_tx,
            updates_tx,
            event_tx,
            event_rx,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Start a text turn. A blank prompt is ignored.
    pub fn submit_text(&mut self, prompt: impl Into<String>) -> Result<(), SessionError> {
        self.submit(Request::text(prompt))
    }

    /// Start a file turn
    pub fn submit_file(
        &mut self,
        file: UploadFile,
        prompt: Option<String>,
    ) -> Result<(), SessionError> {
        self.submit(Request::file(file, prompt))
    }

    fn submit(&mut self, request: Request) -> Result<(), SessionError> {
        let ids = self.ids.next_turn();
        self.dispatch(Event::Submit { request, ids }).map_err(|e| {
            tracing::info!(error = %e, state = ?self.state, "Submit rejected");
            let _ = self.updates_tx.send(SessionUpdate::Rejected {
                reason: e.to_string(),
            });
            SessionError::from(e)
        })
    }

    /// Stop whatever the current turn is doing.
    ///
    /// Returns `false` when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        let could_stop = self.state.accepts_stop();
        if let Err(e) = self.dispatch(Event::Stop) {
            tracing::warn!(error = %e, "Stop failed");
        }
        could_stop
    }

    // ========================================================================
    // Event Loop
    // ========================================================================

    /// Wait for the next background event and apply it.
    ///
    /// Cancel-safe: dropping the future before it completes loses nothing.
    pub async fn step(&mut self) {
        // The controller holds a sender, so the channel never closes
        if let Some(event) = self.event_rx.recv().await {
            self.apply_background(event);
        }
    }

    /// Apply background events until the current turn has finished
    pub async fn settle(&mut self) {
        while !self.state.is_idle() {
            self.step().await;
        }
    }

    /// Apply every background event that has already arrived
    #[cfg(test)]
    pub fn process_pending(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_background(event);
        }
    }

    fn apply_background(&mut self, event: Event) {
        if let Err(e) = self.dispatch(event) {
            tracing::warn!(error = %e, state = ?self.state, "Dropped background event");
        }
    }

    fn dispatch(&mut self, event: Event) -> Result<(), TransitionError> {
        let result = transition(&self.state, &self.context, event)?;

        if result.new_state != self.state {
            tracing::debug!(from = ?self.state, to = ?result.new_state, "State transition");
        }
        self.state = result.new_state;

        for effect in result.effects {
            self.execute_effect(effect);
        }
        Ok(())
    }

    // ========================================================================
    // Effects
    // ========================================================================

    #[allow(clippy::too_many_lines)]
    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage(new) => {
                let message = new.into_message(Utc::now());
                tracing::debug!(
                    message_id = %message.id,
                    role = ?message.role,
                    "Appending message"
                );
                self.view_tx
                    .send_modify(|view| view.messages.push(message.clone()));
                let _ = self.updates_tx.send(SessionUpdate::MessageAppended(message));
            }

            Effect::AppendContent { message_id, chunk } => {
                let mut offset = None;
                self.view_tx.send_if_modified(|view| {
                    let Ok(index) = view.messages.binary_search_by_key(&message_id, |m| m.id)
                    else {
                        return false;
                    };
                    let content = &mut view.messages[index].content;
                    offset = Some(content.len());
                    content.push_str(&chunk);
                    true
                });
                if let Some(offset) = offset {
                    let _ = self.updates_tx.send(SessionUpdate::ContentAppended {
                        message_id,
                        offset,
                        chunk,
                    });
                } else {
                    tracing::warn!(message_id = %message_id, "Content update for unknown message");
                }
            }

            Effect::SendRequest { request } => {
                self.warn_if_busy("request");
                let token = CancellationToken::new();
                self.active = ActiveOperation::Request(token.clone());
                self.spawn_request(request, token);
            }

            Effect::AbortRequest => {
                if let ActiveOperation::Request(token) = &self.active {
                    tracing::info!("Cancelling in-flight request");
                    token.cancel();
                }
            }

            Effect::ReleaseRequest => {
                if matches!(self.active, ActiveOperation::Request(_)) {
                    self.active = ActiveOperation::None;
                }
            }

            Effect::StartReveal { message_id, text } => {
                self.warn_if_busy("reveal");
                let handle = self.start_reveal(message_id, text);
                self.active = ActiveOperation::Reveal(handle);
            }

            Effect::StopReveal => {
                if let ActiveOperation::Reveal(handle) = &self.active {
                    let stopped = handle.stop();
                    tracing::info!(stopped, "Reveal stopped");
                }
            }

            Effect::ReleaseReveal => {
                if matches!(self.active, ActiveOperation::Reveal(_)) {
                    self.active = ActiveOperation::None;
                }
            }

            Effect::ScheduleStreamRelease { message_id, delay } => {
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(Event::StopGraceElapsed { message_id });
                });
            }

            Effect::PublishState => {
                let state = &self.state;
                self.view_tx.send_modify(|view| view.apply_state(state));
                let _ = self
                    .updates_tx
                    .send(SessionUpdate::StateChanged(self.state.clone()));
            }

            Effect::NotifyTurnFinished { outcome } => {
                tracing::info!(?outcome, "Turn finished");
                let _ = self.updates_tx.send(SessionUpdate::TurnFinished { outcome });
            }
        }
    }

    fn warn_if_busy(&self, starting: &str) {
        let busy = match &self.active {
            ActiveOperation::None => false,
            ActiveOperation::Request(token) => !token.is_cancelled(),
            ActiveOperation::Reveal(handle) => !handle.is_finished(),
        };
        if busy {
            tracing::warn!(starting, active = ?self.active, "Replacing an active operation");
        }
    }

    fn spawn_request(&self, request: Request, token: CancellationToken) {
        let transport = Arc::clone(&self.transport);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            tracing::debug!(kind = ?request.kind(), "Sending request (background)");

            // Race the request against cancellation so a transport that is
            // slow to notice the token still releases the turn promptly
            let result = tokio::select! {
                biased;

                () = token.cancelled() => Err(TransportError::cancelled()),

                result = transport.send(&request, token.clone()) => result,
            };

            let event = match result {
                Ok(response) => Event::RequestSucceeded {
                    text: response.response,
                },
                Err(error) => Event::RequestFailed { error },
            };
            let _ = event_tx.send(event);
        });
    }

    fn start_reveal(&self, message_id: MessageId, text: String) -> RevealHandle {
        let partial_tx = self.event_tx.clone();
        let complete_tx = self.event_tx.clone();
        tracing::debug!(message_id = %message_id, chars = text.chars().count(), "Starting reveal");

        // Forward only the newly revealed tail of each prefix
        let mut sent = 0;
        self.reveal.start(
            text,
            move |prefix: &str| {
                if let Some(chunk) = prefix.get(sent..) {
                    sent = prefix.len();
                    let _ = partial_tx.send(Event::RevealProgress {
                        message_id,
                        chunk: chunk.to_string(),
                    });
                }
            },
            move || {
                let _ = complete_tx.send(Event::RevealCompleted { message_id });
            },
        )
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn state(&self) -> &TurnState {
        &self.state
    }

    pub fn messages(&self) -> Vec<Message> {
        self.view_tx.borrow().messages.clone()
    }

    #[allow(dead_code)] // Observation API; the REPL renders from updates
    pub fn message(&self, id: MessageId) -> Option<Message> {
        let view = self.view_tx.borrow();
        view.messages
            .binary_search_by_key(&id, |m| m.id)
            .ok()
            .map(|index| view.messages[index].clone())
    }

    #[allow(dead_code)]
    pub fn loading(&self) -> bool {
        self.state.is_loading()
    }

    #[allow(dead_code)]
    pub fn streaming_target(&self) -> Option<MessageId> {
        self.state.streaming_target()
    }

    #[allow(dead_code)]
    pub fn cancellation_requested(&self) -> bool {
        self.state.is_cancellation_requested()
    }

    pub fn can_stop(&self) -> bool {
        self.state.can_stop()
    }

    /// Current snapshot, kept up to date in place
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_tx.subscribe()
    }

    /// Change notifications from now on
    pub fn updates(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates_tx.subscribe()
    }
}

impl<T: Transport + 'static> Drop for SessionController<T> {
    fn drop(&mut self) {
        match std::mem::take(&mut self.active) {
            ActiveOperation::Request(token) => token.cancel(),
            // Dropping the handle stops the reveal
            ActiveOperation::Reveal(_) | ActiveOperation::None => {}
        }
    }
}
