//! Ranks as threads of one process
//!
//! Each rank owns a mailbox. A send pushes an envelope into the mailbox of
//! the destination and never blocks; a receive blocks until an envelope with
//! matching source and tag arrives. Messages from one source with one tag
//! are delivered in order, envelopes with other tags are left in place.
//!
//! # Example
//! ```
//! use halopde::comm::{Communicator, ThreadUniverse};
//!
//! let sums = ThreadUniverse::new(2).run(|comm| {
//!     let peer = 1 - comm.rank();
//!     comm.send(peer, 7, &[comm.rank() as f64]).unwrap();
//!     let mut buf = [0.];
//!     comm.receive_into(peer, 7, &mut buf).unwrap();
//!     buf[0]
//! });
//! assert_eq!(sums, vec![1., 0.]);
//! ```
use super::{Communicator, HaloMessage, Tag, BROADCAST_TAG};
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

const NOT_ABORTED: usize = usize::MAX;

#[derive(Debug)]
enum Payload {
    Real(Vec<f64>),
    Int(Vec<i32>),
}

impl Payload {
    fn len(&self) -> usize {
        match self {
            Payload::Real(v) => v.len(),
            Payload::Int(v) => v.len(),
        }
    }
}

#[derive(Debug)]
struct Envelope {
    source: usize,
    tag: Tag,
    payload: Payload,
}

#[derive(Debug, Default)]
struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    ready: Condvar,
}

#[derive(Debug)]
struct Shared {
    mailboxes: Vec<Mailbox>,
    aborted_by: AtomicUsize,
    recv_timeout: Option<Duration>,
}

impl Shared {
    fn lock(&self, rank: usize) -> MutexGuard<'_, VecDeque<Envelope>> {
        // a rank that panicked while holding the lock left a consistent queue
        self.mailboxes[rank]
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn aborted_by(&self) -> Option<usize> {
        match self.aborted_by.load(Ordering::SeqCst) {
            NOT_ABORTED => None,
            rank => Some(rank),
        }
    }
}

/// Set of thread ranks sharing their mailboxes
#[derive(Debug, Clone)]
pub struct ThreadUniverse {
    shared: Arc<Shared>,
}

impl ThreadUniverse {
    /// Universe of `size` ranks, receives block forever
    pub fn new(size: usize) -> Self {
        Self::with_timeout(size, None)
    }

    /// Universe of `size` ranks; receives fail with [`Error::Timeout`] after
    /// `recv_timeout`
    pub fn with_timeout(size: usize, recv_timeout: Option<Duration>) -> Self {
        let mailboxes = (0..size).map(|_| Mailbox::default()).collect();
        Self {
            shared: Arc::new(Shared {
                mailboxes,
                aborted_by: AtomicUsize::new(NOT_ABORTED),
                recv_timeout,
            }),
        }
    }

    /// Number of ranks
    pub fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    /// Communicator of `rank`
    ///
    /// # Panics
    /// `rank` is out of range.
    pub fn communicator(&self, rank: usize) -> ThreadComm {
        assert!(rank < self.size(), "rank {} out of range", rank);
        ThreadComm {
            rank,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run `f` on every rank in its own thread and collect the results,
    /// indexed by rank
    ///
    /// A rank that panics aborts the universe, so that its partners do not
    /// wait forever; the panic is then propagated to the caller.
    pub fn run<F, T>(&self, f: F) -> Vec<T>
    where
        F: Fn(ThreadComm) -> T + Sync,
        T: Send,
    {
        let f = &f;
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.size())
                .map(|rank| {
                    let comm = self.communicator(rank);
                    std::thread::Builder::new()
                        .name(format!("rank-{}", rank))
                        .spawn_scoped(scope, move || {
                            let _guard = AbortOnPanic(comm.clone());
                            f(comm)
                        })
                        .unwrap_or_else(|e| panic!("cannot spawn rank {}: {}", rank, e))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }
}

struct AbortOnPanic(ThreadComm);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.abort(1);
        }
    }
}

/// Communicator of one thread rank
#[derive(Debug, Clone)]
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    fn check_peer(&self, peer: usize, tag: Tag) -> Result<()> {
        if peer >= self.size() {
            return Err(Error::Communication {
                rank: self.rank,
                peer,
                tag,
                message: format!("no such rank, universe has {} ranks", self.size()),
            });
        }
        Ok(())
    }

    fn post(&self, dest: usize, tag: Tag, payload: Payload) -> Result<()> {
        self.check_peer(dest, tag)?;
        if let Some(by) = self.shared.aborted_by() {
            return Err(Error::Aborted(by));
        }
        log::trace!("[{}]: send {} values to {}", self.rank, payload.len(), dest);
        let mut queue = self.shared.lock(dest);
        queue.push_back(Envelope {
            source: self.rank,
            tag,
            payload,
        });
        drop(queue);
        self.shared.mailboxes[dest].ready.notify_all();
        Ok(())
    }

    fn take(&self, source: usize, tag: Tag) -> Result<Payload> {
        self.check_peer(source, tag)?;
        let mailbox = &self.shared.mailboxes[self.rank];
        let deadline = self.shared.recv_timeout.map(|t| Instant::now() + t);
        let mut queue = self.shared.lock(self.rank);
        loop {
            if let Some(by) = self.shared.aborted_by() {
                return Err(Error::Aborted(by));
            }
            if let Some(pos) = queue
                .iter()
                .position(|e| e.source == source && e.tag == tag)
            {
                if let Some(envelope) = queue.remove(pos) {
                    return Ok(envelope.payload);
                }
            }
            queue = match deadline {
                None => mailbox
                    .ready
                    .wait(queue)
                    .unwrap_or_else(std::sync::PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout {
                            rank: self.rank,
                            peer: source,
                            tag,
                        });
                    }
                    mailbox
                        .ready
                        .wait_timeout(queue, deadline - now)
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    fn length_mismatch(&self, source: usize, tag: Tag, got: usize, expected: usize) -> Error {
        Error::Communication {
            rank: self.rank,
            peer: source,
            tag,
            message: format!("received {} values, expected {}", got, expected),
        }
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.mailboxes.len()
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<()> {
        self.post(dest, tag, Payload::Real(data.to_vec()))
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<()> {
        match self.take(source, tag)? {
            Payload::Real(data) if data.len() == buf.len() => {
                buf.copy_from_slice(&data);
                log::trace!("[{}]: {} values from {} received", self.rank, buf.len(), source);
                Ok(())
            }
            payload => Err(self.length_mismatch(source, tag, payload.len(), buf.len())),
        }
    }

    fn exchange(&self, tag: Tag, messages: Vec<HaloMessage<'_>>) -> Result<()> {
        // mailbox sends never block, so posting them all first is the
        // non-blocking send of the mpi backend
        for m in &messages {
            self.send(m.peer, tag, m.send)?;
        }
        for m in messages {
            self.receive_into(m.peer, tag, m.recv)?;
        }
        Ok(())
    }

    fn broadcast(&self, root: usize, buf: &mut [i32]) -> Result<()> {
        if self.rank == root {
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.post(dest, BROADCAST_TAG, Payload::Int(buf.to_vec()))?;
            }
            return Ok(());
        }
        match self.take(root, BROADCAST_TAG)? {
            Payload::Int(data) if data.len() == buf.len() => {
                buf.copy_from_slice(&data);
                Ok(())
            }
            payload => Err(self.length_mismatch(root, BROADCAST_TAG, payload.len(), buf.len())),
        }
    }

    fn abort(&self, code: i32) {
        log::error!("[{}]: aborting run with code {}", self.rank, code);
        let _ = self.shared.aborted_by.compare_exchange(
            NOT_ABORTED,
            self.rank,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        for (rank, mailbox) in self.shared.mailboxes.iter().enumerate() {
            // take the lock so that no receiver misses the wake up
            let _queue = self.shared.lock(rank);
            mailbox.ready.notify_all();
        }
    }
}
