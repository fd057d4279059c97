//! Operator channel: listener registry, status broadcast and `ask`.
//!
//! Listeners are kept in connection order; the most recent one is the
//! primary and receives questions. At most one question is outstanding at a
//! time; a second concurrent `ask` is rejected with `QuestionPending`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use browzee_core::{traits::HumanInteraction, Error, Result};

use crate::message::OutboundMessage;

/// Identifier handed out by [`InteractionChannel::connect`].
pub type ListenerId = u64;

struct Pending {
    request_id: String,
    listener: ListenerId,
    question: String,
    tx: oneshot::Sender<Result<String>>,
}

#[derive(Default)]
struct Registry {
    next_id: ListenerId,
    /// Oldest first; the last entry is the primary.
    listeners: Vec<(ListenerId, mpsc::UnboundedSender<OutboundMessage>)>,
    pending: Option<Pending>,
}

impl Registry {
    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        let removed = self.listeners.len() != before;

        let bound_here = self.pending.as_ref().is_some_and(|p| p.listener == id);
        if removed && bound_here {
            if let Some(p) = self.pending.take() {
                tracing::warn!(request_id = %p.request_id, listener = id, "Operator left with a question outstanding");
                let _ = p.tx.send(Err(Error::ConnectionLost));
            }
        }
        removed
    }

    fn prune_closed(&mut self) {
        let dead: Vec<ListenerId> = self
            .listeners
            .iter()
            .filter(|(_, tx)| tx.is_closed())
            .map(|(id, _)| *id)
            .collect();
        for id in dead {
            self.remove(id);
        }
    }
}

/// Fan-out/fan-in channel between the agent and connected operators.
pub struct InteractionChannel {
    registry: Mutex<Registry>,
    ask_timeout: Option<Duration>,
}

impl Default for InteractionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionChannel {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            ask_timeout: None,
        }
    }

    /// Bound how long `ask` waits for an answer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = Some(timeout);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a listener. It becomes the primary.
    pub fn connect(&self) -> (ListenerId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reg = self.lock();
        reg.next_id += 1;
        let id = reg.next_id;
        reg.listeners.push((id, tx));
        tracing::debug!(listener = id, total = reg.listeners.len(), "Operator connected");
        (id, rx)
    }

    /// Remove a listener. Unknown ids are ignored.
    pub fn disconnect(&self, id: ListenerId) {
        let mut reg = self.lock();
        if reg.remove(id) {
            tracing::debug!(listener = id, remaining = reg.listeners.len(), "Operator disconnected");
        }
    }

    pub fn listener_count(&self) -> usize {
        let mut reg = self.lock();
        reg.prune_closed();
        reg.listeners.len()
    }

    pub fn primary(&self) -> Option<ListenerId> {
        let mut reg = self.lock();
        reg.prune_closed();
        reg.listeners.last().map(|(id, _)| *id)
    }

    /// Text of the outstanding question, if any.
    pub fn pending_question(&self) -> Option<String> {
        self.lock().pending.as_ref().map(|p| p.question.clone())
    }

    /// Send a status line to every listener, in order. Succeeds with none.
    pub fn send_status(&self, message: &str) {
        let mut reg = self.lock();
        let msg = OutboundMessage::Status {
            message: message.to_string(),
        };
        let mut dead = Vec::new();
        for (id, tx) in &reg.listeners {
            if tx.send(msg.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            reg.remove(id);
        }
    }

    /// Resolve the outstanding question if its id matches.
    ///
    /// Returns `false` when nothing with that id is pending.
    pub fn answer(&self, request_id: &str, text: &str) -> bool {
        let mut reg = self.lock();
        if reg.pending.as_ref().map(|p| p.request_id.as_str()) != Some(request_id) {
            tracing::debug!(request_id, "Ignoring answer for unknown request");
            return false;
        }
        match reg.pending.take() {
            Some(p) => p.tx.send(Ok(text.to_string())).is_ok(),
            None => false,
        }
    }

    /// Resolve whatever question is outstanding with a free-form reply.
    pub fn deliver(&self, text: &str) -> bool {
        match self.lock().pending.take() {
            Some(p) => {
                tracing::debug!(request_id = %p.request_id, "Answer delivered");
                p.tx.send(Ok(text.to_string())).is_ok()
            }
            None => {
                tracing::debug!("Inbound message with no question pending");
                false
            }
        }
    }

    async fn ask_inner(&self, question: &str) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let request_id = Uuid::new_v4().to_string();

        {
            let mut reg = self.lock();
            if let Some(p) = &reg.pending {
                return Err(Error::QuestionPending(p.question.clone()));
            }
            reg.prune_closed();
            let (listener, sender) = match reg.listeners.last() {
                Some((id, sender)) => (*id, sender.clone()),
                None => return Err(Error::NoOperatorConnected),
            };
            // Enqueued before we suspend so the operator always sees it
            sender
                .send(OutboundMessage::Question {
                    request_id: request_id.clone(),
                    question: question.to_string(),
                })
                .map_err(|_| Error::ConnectionLost)?;
            reg.pending = Some(Pending {
                request_id: request_id.clone(),
                listener,
                question: question.to_string(),
                tx,
            });
        }

        metrics::counter!("browzee_questions_total").increment(1);
        tracing::info!(request_id = %request_id, "Waiting for operator answer");

        let _guard = PendingGuard {
            channel: self,
            request_id: &request_id,
        };

        let received = match self.ask_timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(r) => r,
                Err(_) => {
                    tracing::warn!(request_id = %request_id, "Operator did not answer in time");
                    return Err(Error::Timeout(format!(
                        "no answer within {}s",
                        limit.as_secs()
                    )));
                }
            },
            None => rx.await,
        };

        received.unwrap_or(Err(Error::ConnectionLost))
    }
}

/// Clears the pending slot if the asking future goes away first.
struct PendingGuard<'a> {
    channel: &'a InteractionChannel,
    request_id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut reg = self.channel.lock();
        if reg
            .pending
            .as_ref()
            .is_some_and(|p| p.request_id == self.request_id)
        {
            reg.pending = None;
        }
    }
}

#[async_trait]
impl HumanInteraction for InteractionChannel {
    async fn broadcast(&self, message: &str) -> Result<()> {
        self.send_status(message);
        Ok(())
    }

    async fn ask(&self, question: &str) -> Result<String> {
        self.ask_inner(question).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_most_recent_is_primary() {
        let channel = InteractionChannel::new();
        let (a, _rx_a) = channel.connect();
        let (b, _rx_b) = channel.connect();
        assert_eq!(channel.primary(), Some(b));
        channel.disconnect(b);
        assert_eq!(channel.primary(), Some(a));
        channel.disconnect(a);
        assert_eq!(channel.primary(), None);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let channel = InteractionChannel::new();
        let (_a, rx) = channel.connect();
        drop(rx);
        channel.send_status("hello");
        assert_eq!(channel.listener_count(), 0);
    }
}
