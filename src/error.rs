//! Error type shared by all components
//!
//! Every error is fatal for the distributed run: there is no per-cell or
//! per-sweep recovery. Errors are propagated to the driver, which aborts
//! all ranks (see [`crate::solver::run`]).
use thiserror::Error;

/// Errors of the domain decomposed solver
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, detected before any communication
    #[error("configuration error: {0}")]
    Config(String),

    /// A send or receive failed or delivered an unexpected message
    #[error("communication error on rank {rank} with peer {peer} (tag {tag}): {message}")]
    Communication {
        /// Rank which detected the failure
        rank: usize,
        /// Partner rank
        peer: usize,
        /// Message tag
        tag: i32,
        /// Description
        message: String,
    },

    /// A blocking receive did not complete in time
    #[error("rank {rank} timed out waiting for peer {peer} (tag {tag})")]
    Timeout {
        /// Waiting rank
        rank: usize,
        /// Rank the message was expected from
        peer: usize,
        /// Expected tag
        tag: i32,
    },

    /// Another rank aborted the run
    #[error("run aborted by rank {0}")]
    Aborted(usize),

    /// Filesystem error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Error while encoding a png snapshot
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Error of the hdf5 library
    #[cfg(feature = "hdf5")]
    #[error("hdf5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

/// Result alias of this crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config(message.into())
    }
}
