//! One-shot handoff messages exchanged by a matched pair
//!
//! An [`Announcement`] sits in the lobby slot while its creator waits for a
//! counterpart. The joiner answers it with a [`MatchOutcome`], and the
//! offerer closes the exchange with a [`Reply`]: either the match, or the
//! joiner's own payload when the offerer left before committing.

use tokio::sync::oneshot;

/// Ticket identifying which call published an announcement
pub(crate) type Ticket = u64;

/// A caller's outstanding, unmatched wait
pub(crate) struct Announcement<Id, T> {
    ticket: Ticket,
    outcome_tx: oneshot::Sender<MatchOutcome<Id, T>>,
}

/// Message from joiner to offerer: the joiner's payload plus a return channel
pub(crate) struct MatchOutcome<Id, T> {
    pub reply_tx: oneshot::Sender<Reply<Id, T>>,
    pub payload: T,
}

/// Message from offerer back to joiner
pub(crate) enum Reply<Id, T> {
    /// The pair committed: shared identifier plus the offerer's payload
    Matched { id: Id, payload: T },
    /// The offerer went away after delivery; the joiner gets its payload back
    Requeue(T),
}

impl<Id, T> Announcement<Id, T> {
    /// Create an announcement and the receiver its creator waits on
    pub(crate) fn new(ticket: Ticket) -> (Self, oneshot::Receiver<MatchOutcome<Id, T>>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        (Self { ticket, outcome_tx }, outcome_rx)
    }

    pub(crate) fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Hand the outcome to the announcing call.
    ///
    /// Fails, returning the outcome, when the announcing call is gone.
    pub(crate) fn deliver(self, outcome: MatchOutcome<Id, T>) -> Result<(), MatchOutcome<Id, T>> {
        self.outcome_tx.send(outcome)
    }
}

impl<Id, T> Reply<Id, T> {
    /// The payload carried by either variant
    pub(crate) fn into_payload(self) -> T {
        match self {
            Reply::Matched { payload, .. } => payload,
            Reply::Requeue(payload) => payload,
        }
    }
}

impl<Id, T> MatchOutcome<Id, T> {
    /// Wrap a joiner's payload with a fresh reply channel
    pub(crate) fn new(payload: T) -> (Self, oneshot::Receiver<Reply<Id, T>>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        (Self { reply_tx, payload }, reply_rx)
    }
}
