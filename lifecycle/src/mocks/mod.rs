//! In-memory implementations of the collaborators consumed by this crate.

use crate::{Id, ID_LENGTH};
use thiserror::Error;

pub mod chain;
pub mod dag;

/// Errors returned by mock collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("malformed bytes")]
    Malformed,
    #[error("injected failure")]
    Injected,
    #[error("not found: {0}")]
    NotFound(Id),
    #[error("no block indexed at height {0}")]
    Unindexed(u64),
    #[error("nothing to build")]
    NothingToBuild,
}

/// Deterministically derive an [Id] from `seed`.
pub fn id(seed: u64) -> Id {
    let mut bytes = [0u8; ID_LENGTH];
    bytes[..8].copy_from_slice(&seed.to_be_bytes());
    bytes[ID_LENGTH - 1] = 0xff;
    Id::from(bytes)
}
