//! # Point to point communication between ranks
//!
//! The solver only talks to other ranks through [`Communicator`]. Two
//! backends implement it:
//!
//! - [`ThreadComm`]: every rank is a thread of the same process, messages
//!   travel through per-rank mailboxes. Always available, used by the tests.
//! - `MpiComm` (feature `mpi`): every rank is an MPI process.
//!
//! Messages are fixed-size `f64` arrays keyed by (sender, receiver, tag).
pub mod thread;
#[cfg(feature = "mpi")]
pub mod mpi;
pub use thread::{ThreadComm, ThreadUniverse};

use crate::error::Result;

/// Message tag
pub type Tag = i32;

/// Largest tag every MPI implementation has to support
pub const TAG_UPPER_BOUND: Tag = 32767;

/// Tag reserved for the broadcast of the partition
pub const BROADCAST_TAG: Tag = 0;

/// Hands out a fresh tag for every exchange and gather
///
/// Tags increase monotonically and wrap around to 1 after
/// [`TAG_UPPER_BOUND`]. Wrapping is safe because an exchange completes on
/// both partners before either starts the next one.
#[derive(Debug, Clone)]
pub struct TagCounter {
    next: Tag,
}

impl Default for TagCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl TagCounter {
    /// Counter starting at tag 1
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next tag
    pub fn next_tag(&mut self) -> Tag {
        let tag = self.next;
        self.next = if tag >= TAG_UPPER_BOUND { 1 } else { tag + 1 };
        tag
    }
}

/// Send and receive buffer of one halo, shared with one neighbour
#[derive(Debug)]
pub struct HaloMessage<'a> {
    /// Neighbour rank
    pub peer: usize,
    /// Own edge values
    pub send: &'a [f64],
    /// Destination of the neighbour's edge values
    pub recv: &'a mut [f64],
}

/// Communication primitives needed by the solver
pub trait Communicator {
    /// Rank of this worker
    fn rank(&self) -> usize;

    /// Number of workers
    fn size(&self) -> usize;

    /// Send `data` to `dest`
    ///
    /// # Errors
    /// Send failed or the run was aborted.
    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<()>;

    /// Receive exactly `buf.len()` values from `source`
    ///
    /// # Errors
    /// Receive failed, message has the wrong length, timed out, or the run
    /// was aborted.
    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<()>;

    /// Halo exchange with several neighbours
    ///
    /// All sends are posted non-blocking first, then the receives are
    /// performed one after another in the given order. Returns after all
    /// receives completed and all sends were delivered.
    ///
    /// # Errors
    /// See [`Communicator::receive_into`].
    fn exchange(&self, tag: Tag, messages: Vec<HaloMessage<'_>>) -> Result<()>;

    /// Broadcast `buf` from `root` to all ranks
    ///
    /// # Errors
    /// See [`Communicator::receive_into`].
    fn broadcast(&self, root: usize, buf: &mut [i32]) -> Result<()>;

    /// Terminate the run on all ranks
    fn abort(&self, code: i32);
}
