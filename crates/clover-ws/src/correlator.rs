//! Sequence-id correlation between waited requests and their acknowledgements.
//!
//! Each waited request registers a single-use waiter under its sequence id
//! before the frame is written. The receive loop resolves and removes the
//! waiter when the matching ack arrives. Teardown fails every waiter still
//! outstanding and refuses new registrations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use clover_core::{CloverError, ServerAck};

type Waiter = oneshot::Sender<Result<ServerAck, CloverError>>;

#[derive(Default)]
struct Table {
    /// seq id → (registration ticket, waiter)
    pending: HashMap<i64, (u64, Waiter)>,
    next_ticket: u64,
    closed: bool,
}

/// Pending-request table for one connection.
#[derive(Default)]
pub struct Correlator {
    table: Mutex<Table>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `seq_id`.
    ///
    /// Fails with `Usage` if `seq_id` is already outstanding and with
    /// `ConnectionClosed` once the table has been closed.
    pub fn register(self: &Arc<Self>, seq_id: i64) -> Result<PendingAck, CloverError> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table();
        if table.closed {
            return Err(CloverError::ConnectionClosed);
        }
        if table.pending.contains_key(&seq_id) {
            return Err(CloverError::Usage(format!(
                "sequence id {seq_id} already has an outstanding request"
            )));
        }
        let ticket = table.next_ticket;
        table.next_ticket += 1;
        table.pending.insert(seq_id, (ticket, tx));
        Ok(PendingAck {
            correlator: Arc::clone(self),
            seq_id,
            ticket,
            rx,
        })
    }

    /// Resolve the waiter matching `ack.seq_id`, if any.
    ///
    /// A non-zero `apiCode` resolves it with the decoded error. Returns
    /// `false` for an unknown sequence id.
    pub fn resolve(&self, ack: ServerAck) -> bool {
        let Some((_, waiter)) = self.table().pending.remove(&ack.seq_id) else {
            return false;
        };
        // The caller may have stopped waiting; that is not our failure.
        let _ = waiter.send(ack.into_result());
        true
    }

    /// Fail every outstanding waiter with `ConnectionClosed` and refuse new
    /// registrations. Returns how many waiters were failed.
    pub fn close(&self) -> usize {
        let drained: Vec<_> = {
            let mut table = self.table();
            table.closed = true;
            table.pending.drain().collect()
        };
        let count = drained.len();
        for (_, (_, waiter)) in drained {
            let _ = waiter.send(Err(CloverError::ConnectionClosed));
        }
        count
    }

    pub fn is_closed(&self) -> bool {
        self.table().closed
    }

    pub fn is_pending(&self, seq_id: i64) -> bool {
        self.table().pending.contains_key(&seq_id)
    }

    /// Number of outstanding waiters.
    pub fn len(&self) -> usize {
        self.table().pending.len()
    }

    /// Returns `true` if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the entry for `seq_id` only if it is still this registration.
    fn withdraw(&self, seq_id: i64, ticket: u64) {
        let mut table = self.table();
        if matches!(table.pending.get(&seq_id), Some((t, _)) if *t == ticket) {
            table.pending.remove(&seq_id);
        }
    }
}

/// A registered wait for one acknowledgement.
///
/// Dropping it (including by timing out or cancelling the awaiting task)
/// withdraws the registration so the sequence id can be reused.
pub struct PendingAck {
    correlator: Arc<Correlator>,
    seq_id: i64,
    ticket: u64,
    rx: oneshot::Receiver<Result<ServerAck, CloverError>>,
}

impl PendingAck {
    pub fn seq_id(&self) -> i64 {
        self.seq_id
    }

    /// Suspend until the ack arrives, the connection is torn down, or
    /// `timeout` elapses.
    pub async fn wait(mut self, timeout: Option<Duration>) -> Result<ServerAck, CloverError> {
        let outcome = match timeout {
            Some(limit) => match time::timeout(limit, &mut self.rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(CloverError::Timeout {
                        ms: limit.as_millis() as u64,
                    })
                }
            },
            None => (&mut self.rx).await,
        };
        match outcome {
            Ok(result) => result,
            Err(_) => Err(CloverError::ConnectionClosed),
        }
    }
}

impl Drop for PendingAck {
    fn drop(&mut self) {
        self.correlator.withdraw(self.seq_id, self.ticket);
    }
}
