#![forbid(unsafe_code)]

//! Child loaders and the completion channel.
//!
//! A [`Loader`] receives the path of a node and a [`LoadReply`]. It may answer
//! immediately or hand the reply to another thread; either way the answer is
//! queued on a channel and only applied when the owner of the
//! [`TreeDriver`] pumps it. Completions therefore never interleave with a
//! toggle or a scroll.
//!
//! A reply that is dropped without an answer reports a failure, so every
//! issued load eventually resolves.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::occlusion::ViewportGeometry;
use crate::path::TreePath;
use crate::session::{Completion, LoadOutcome, LoadTicket, ToggleEffect, TreeSession};
use crate::view::ViewFrame;

/// Reason reported for a reply that went out of scope unanswered.
pub const DROPPED_REPLY: &str = "loader dropped the request";

/// Source of child labels.
pub trait Loader {
    /// Fetch the child labels of `path` and answer through `reply`.
    fn load(&mut self, path: &TreePath, reply: LoadReply);
}

impl<F> Loader for F
where
    F: FnMut(&TreePath, LoadReply),
{
    fn load(&mut self, path: &TreePath, reply: LoadReply) {
        self(path, reply);
    }
}

/// A queued loader answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResponse {
    pub ticket: LoadTicket,
    pub outcome: LoadOutcome,
}

/// One-shot answer handle for a single load.
#[derive(Debug)]
pub struct LoadReply {
    ticket: LoadTicket,
    sender: Option<Sender<LoadResponse>>,
}

impl LoadReply {
    fn new(ticket: LoadTicket, sender: Sender<LoadResponse>) -> Self {
        Self {
            ticket,
            sender: Some(sender),
        }
    }

    #[must_use]
    pub fn ticket(&self) -> &LoadTicket {
        &self.ticket
    }

    /// Deliver the full list of child labels.
    pub fn succeed<I, S>(mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels = labels.into_iter().map(Into::into).collect();
        self.send(LoadOutcome::Loaded(labels));
    }

    /// Report a failure after `partial` labels were produced.
    pub fn fail(mut self, partial: Vec<String>, reason: impl Into<String>) {
        self.send(LoadOutcome::Failed {
            partial,
            reason: reason.into(),
        });
    }

    fn send(&mut self, outcome: LoadOutcome) {
        if let Some(sender) = self.sender.take() {
            let response = LoadResponse {
                ticket: self.ticket.clone(),
                outcome,
            };
            // The driver is gone; nobody is waiting for this answer.
            if sender.send(response).is_err() {
                trace!(path = %self.ticket.path(), "reply after driver shutdown");
            }
        }
    }
}

impl Drop for LoadReply {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.send(LoadOutcome::Failed {
                partial: Vec::new(),
                reason: DROPPED_REPLY.to_string(),
            });
        }
    }
}

/// Couples a [`TreeSession`] with a [`Loader`].
///
/// Load tickets issued by the session are dispatched to the loader, and
/// answers are applied in arrival order by [`pump`](Self::pump).
#[derive(Debug)]
pub struct TreeDriver<L> {
    session: TreeSession,
    loader: L,
    sender: Sender<LoadResponse>,
    receiver: Receiver<LoadResponse>,
    in_flight: usize,
}

impl<L: Loader> TreeDriver<L> {
    #[must_use]
    pub fn new(config: TreeConfig, loader: L) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            session: TreeSession::new(config),
            loader,
            sender,
            receiver,
            in_flight: 0,
        }
    }

    /// Issue the root load. Returns `false` if it is already loading or
    /// loaded.
    pub fn start(&mut self) -> bool {
        match self.session.start() {
            Some(ticket) => {
                self.dispatch(ticket);
                true
            }
            None => false,
        }
    }

    pub fn toggle(&mut self, path: &TreePath) -> ToggleEffect {
        let effect = self.session.toggle(path);
        if let ToggleEffect::Load(ticket) = &effect {
            self.dispatch(ticket.clone());
        }
        effect
    }

    pub fn scroll(&mut self, geometry: ViewportGeometry) -> Option<ViewFrame> {
        self.session.scroll(geometry)
    }

    /// Apply every answer that is already queued.
    pub fn pump(&mut self) -> Vec<Result<Completion, TreeError>> {
        let mut results = Vec::new();
        while let Ok(response) = self.receiver.try_recv() {
            results.push(self.apply(response));
        }
        results
    }

    /// Wait up to `timeout` for one answer and apply it.
    pub fn pump_timeout(&mut self, timeout: Duration) -> Option<Result<Completion, TreeError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(response) => Some(self.apply(response)),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Apply answers until no load is outstanding or `timeout` elapses.
    pub fn settle(&mut self, timeout: Duration) -> Vec<Result<Completion, TreeError>> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::new();
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(in_flight = self.in_flight, "settle timed out");
                break;
            }
            match self.pump_timeout(remaining) {
                Some(result) => results.push(result),
                None => break,
            }
        }
        results
    }

    /// Loads dispatched whose answers have not been applied yet.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    #[must_use]
    pub fn frame(&self) -> ViewFrame {
        self.session.frame()
    }

    #[must_use]
    pub fn session(&self) -> &TreeSession {
        &self.session
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }

    fn dispatch(&mut self, ticket: LoadTicket) {
        self.in_flight += 1;
        let path = ticket.path().clone();
        let reply = LoadReply::new(ticket, self.sender.clone());
        self.loader.load(&path, reply);
    }

    fn apply(&mut self, response: LoadResponse) -> Result<Completion, TreeError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.session.complete(&response.ticket, response.outcome)
    }
}
