//! Ranks as MPI processes
//!
//! Run with
//!
//! `mpirun -np 4 halopde --backend mpi --nx 2 --ny 2 ...`
//!
//! The universe returned by [`initialize`] must stay alive until the run is
//! complete, dropping it finalizes MPI.
use super::{Communicator, HaloMessage, Tag};
use crate::error::{Error, Result};
use mpi::datatype::Equivalence;
use mpi::point_to_point::Status;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
pub use mpi::environment::Universe;

/// Initialize MPI
///
/// # Errors
/// MPI was already initialized.
pub fn initialize() -> Result<Universe> {
    mpi::initialize().ok_or_else(|| Error::config("mpi is already initialized"))
}

/// Communicator on `MPI_COMM_WORLD`
pub struct MpiComm {
    world: SimpleCommunicator,
}

impl MpiComm {
    /// World communicator of an initialized universe
    pub fn new(universe: &Universe) -> Self {
        Self {
            world: universe.world(),
        }
    }

    fn check_count(&self, status: &Status, source: usize, tag: Tag, expected: usize) -> Result<()> {
        let count = status.count(f64::equivalent_datatype()) as usize;
        if count != expected {
            return Err(Error::Communication {
                rank: self.rank(),
                peer: source,
                tag,
                message: format!("received {} values, expected {}", count, expected),
            });
        }
        Ok(())
    }
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn send(&self, dest: usize, tag: Tag, data: &[f64]) -> Result<()> {
        log::trace!("[{}]: send {} values to {}", self.rank(), data.len(), dest);
        self.world
            .process_at_rank(dest as i32)
            .send_with_tag(data, tag);
        Ok(())
    }

    fn receive_into(&self, source: usize, tag: Tag, buf: &mut [f64]) -> Result<()> {
        let expected = buf.len();
        let status = self
            .world
            .process_at_rank(source as i32)
            .receive_into_with_tag(buf, tag);
        self.check_count(&status, source, tag, expected)
    }

    fn exchange(&self, tag: Tag, messages: Vec<HaloMessage<'_>>) -> Result<()> {
        let world = &self.world;
        let (sends, recvs): (Vec<_>, Vec<_>) = messages
            .into_iter()
            .map(|m| ((m.peer, m.send), (m.peer, m.recv)))
            .unzip();
        mpi::request::scope(|scope| {
            let requests: Vec<_> = sends
                .iter()
                .map(|&(peer, data)| {
                    world
                        .process_at_rank(peer as i32)
                        .immediate_send_with_tag(scope, data, tag)
                })
                .collect();
            let mut result = Ok(());
            for (peer, buf) in recvs {
                let expected = buf.len();
                let status = world
                    .process_at_rank(peer as i32)
                    .receive_into_with_tag(buf, tag);
                if result.is_ok() {
                    result = self.check_count(&status, peer, tag, expected);
                }
            }
            for request in requests {
                request.wait();
            }
            result
        })
    }

    fn broadcast(&self, root: usize, buf: &mut [i32]) -> Result<()> {
        self.world.process_at_rank(root as i32).broadcast_into(buf);
        Ok(())
    }

    fn abort(&self, code: i32) {
        log::error!("[{}]: aborting run with code {}", self.rank(), code);
        self.world.abort(code)
    }
}
