//! The pairwise rendezvous lobby
//!
//! A [`Lobby`] pairs concurrent [`Lobby::queue`] calls two at a time. It owns
//! a single slot that holds at most one [`Announcement`]. A caller finding
//! the slot empty publishes its own announcement and waits as the offerer; a
//! caller finding it occupied takes the announcement and becomes the joiner.
//! Publishing, adopting and withdrawing are each one short critical section
//! on the slot, so a pairing either commits for both sides or for neither.

use crate::lobby::announcement::{Announcement, MatchOutcome, Reply, Ticket};
use crate::types::{Match, QueueOutcome};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Single coordination point for one matchmaking domain
pub struct Lobby<Id, T> {
    /// The outstanding announcement, if a caller is waiting
    slot: Mutex<Option<Announcement<Id, T>>>,
    /// Source of announcement tickets
    next_ticket: AtomicU64,
}

/// Result of the offer-or-adopt race
enum Phase<'a, Id, T> {
    Cancelled,
    Offered(PendingOffer<'a, Id, T>),
    Adopted(Announcement<Id, T>),
}

/// What a second-phase handoff resolved to
enum Step<Id, T> {
    Done(QueueOutcome<Id, T>),
    /// The counterpart vanished before the pair committed; queue again
    Retry(T),
}

/// An announcement this call published and is waiting on.
///
/// Dropping it withdraws the announcement if no one adopted it yet. If a
/// joiner already delivered its outcome, the payload goes back to the joiner
/// so it can queue again.
struct PendingOffer<'a, Id, T> {
    lobby: &'a Lobby<Id, T>,
    ticket: Ticket,
    outcome_rx: oneshot::Receiver<MatchOutcome<Id, T>>,
}

impl<Id, T> PendingOffer<'_, Id, T> {
    fn withdraw(&self) -> bool {
        self.lobby.withdraw(self.ticket)
    }
}

impl<Id, T> Drop for PendingOffer<'_, Id, T> {
    fn drop(&mut self) {
        if self.withdraw() {
            return;
        }

        // Adopted. Close first so a delivery racing this drop either lands
        // before try_recv or fails on the joiner side.
        self.outcome_rx.close();
        if let Ok(outcome) = self.outcome_rx.try_recv() {
            debug!(ticket = self.ticket, "Offer dropped after delivery, returning joiner payload");
            let _ = outcome.reply_tx.send(Reply::Requeue(outcome.payload));
        }
    }
}

impl<Id, T> Lobby<Id, T> {
    /// Create a lobby with an empty slot
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// True when no caller is waiting for a counterpart
    pub fn is_idle(&self) -> bool {
        self.lock_slot().is_none()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Announcement<Id, T>>> {
        // Critical sections only move an Option in or out, so a poisoned
        // lock still guards a consistent slot.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a fresh announcement or adopt the waiting one.
    fn offer_or_adopt(&self, cancel: &CancellationToken) -> Phase<'_, Id, T> {
        if cancel.is_cancelled() {
            return Phase::Cancelled;
        }

        let mut slot = self.lock_slot();
        if let Some(announcement) = slot.take() {
            trace!(ticket = announcement.ticket(), "Adopted waiting announcement");
            return Phase::Adopted(announcement);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (announcement, outcome_rx) = Announcement::new(ticket);
        *slot = Some(announcement);
        trace!(ticket, "Published announcement");

        Phase::Offered(PendingOffer {
            lobby: self,
            ticket,
            outcome_rx,
        })
    }

    /// Take back our announcement. False once someone has adopted it.
    fn withdraw(&self, ticket: Ticket) -> bool {
        let mut slot = self.lock_slot();
        match slot.as_ref() {
            Some(announcement) if announcement.ticket() == ticket => {
                slot.take();
                true
            }
            _ => false,
        }
    }
}

impl<Id: Clone, T> Lobby<Id, T> {
    /// Wait for a counterpart and exchange payloads with it.
    ///
    /// Returns [`QueueOutcome::Cancelled`] if `cancel` fires before the
    /// pairing commits. Once committed the call always completes the match,
    /// even if `cancel` fires afterwards. The side whose announcement was
    /// adopted calls `make_id` and reports `is_originator = true`; both sides
    /// receive the same identifier and each other's payload.
    pub async fn queue<F>(
        &self,
        cancel: &CancellationToken,
        mut make_id: F,
        payload: T,
    ) -> QueueOutcome<Id, T>
    where
        F: FnMut() -> Id,
    {
        let mut payload = payload;

        loop {
            let step = match self.offer_or_adopt(cancel) {
                Phase::Cancelled => return QueueOutcome::Cancelled,
                Phase::Adopted(announcement) => Self::join(announcement, payload).await,
                Phase::Offered(offer) => {
                    Self::await_joiner(offer, cancel, &mut make_id, payload).await
                }
            };

            match step {
                Step::Done(outcome) => return outcome,
                Step::Retry(returned) => payload = returned,
            }
        }
    }

    /// Joiner side: deliver our payload and wait for the identifier.
    async fn join(announcement: Announcement<Id, T>, payload: T) -> Step<Id, T> {
        let ticket = announcement.ticket();
        let (outcome, reply_rx) = MatchOutcome::new(payload);

        if let Err(outcome) = announcement.deliver(outcome) {
            debug!(ticket, "Adopted announcement was abandoned, queueing again");
            return Step::Retry(outcome.payload);
        }

        match reply_rx.await {
            Ok(Reply::Matched { id, payload }) => Step::Done(QueueOutcome::Matched(Match {
                id,
                counterpart: payload,
                is_originator: false,
            })),
            Ok(Reply::Requeue(payload)) => {
                debug!(ticket, "Offerer left before committing, queueing again");
                Step::Retry(payload)
            }
            Err(_) => {
                warn!(ticket, "Offerer went away before sending the match identifier");
                Step::Done(QueueOutcome::Cancelled)
            }
        }
    }

    /// Offerer side: wait for a joiner, mint the identifier and reply.
    async fn await_joiner<F>(
        mut offer: PendingOffer<'_, Id, T>,
        cancel: &CancellationToken,
        make_id: &mut F,
        payload: T,
    ) -> Step<Id, T>
    where
        F: FnMut() -> Id,
    {
        let received = tokio::select! {
            biased;
            received = &mut offer.outcome_rx => received,
            _ = cancel.cancelled() => {
                if offer.withdraw() {
                    trace!(ticket = offer.ticket, "Withdrew announcement after cancellation");
                    return Step::Done(QueueOutcome::Cancelled);
                }
                // Adopted first: the joiner is already delivering.
                (&mut offer.outcome_rx).await
            }
        };

        let outcome = match received {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(ticket = offer.ticket, "Joiner dropped the announcement, queueing again");
                return Step::Retry(payload);
            }
        };

        let id = make_id();
        let reply = Reply::Matched {
            id: id.clone(),
            payload,
        };

        match outcome.reply_tx.send(reply) {
            Ok(()) => Step::Done(QueueOutcome::Matched(Match {
                id,
                counterpart: outcome.payload,
                is_originator: true,
            })),
            Err(reply) => {
                debug!(ticket = offer.ticket, "Joiner went away before the reply, queueing again");
                Step::Retry(reply.into_payload())
            }
        }
    }
}

impl<Id, T> Default for Lobby<Id, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Id, T> fmt::Debug for Lobby<Id, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lobby")
            .field("idle", &self.is_idle())
            .finish()
    }
}
