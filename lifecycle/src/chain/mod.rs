//! Canonical in-memory representation of the blocks of a linear chain.
//!
//! Every block a consensus engine observes must be represented by exactly one object, no matter
//! how it was obtained (fetched from storage, parsed from the network, or built locally). [Cache]
//! enforces this by resolving any [Id] to a single [Wrapper] and by keeping that wrapper in the
//! tier that matches its consensus status:
//!
//! * `verified`: blocks that passed verification and are currently in consensus. This tier is
//!   unbounded and entries leave it only when the block is accepted or rejected.
//! * `decided`: a bounded cache of accepted and rejected blocks.
//! * `unverified`: a bounded cache of processing blocks that have not yet been verified.
//! * `missing`: a bounded negative cache of IDs the [Vm] reported as not found.
//!
//! Lookups check `verified`, `decided`, and `unverified` (in that order). The last accepted
//! block is always resolvable, even when capacity pressure removed it from `decided`.
//!
//! # Lifecycle
//!
//! A [Wrapper] intercepts the lifecycle transitions of its block and moves itself between tiers
//! once the underlying transition succeeds:
//!
//! ```txt
//!                 verify                accept / reject
//! +------------+ -------> +----------+ -----------------> +---------+
//! | unverified |          | verified |                    | decided |
//! +------------+          +----------+                    +---------+
//! ```
//!
//! Accepting a block additionally makes it the last accepted block. If the underlying
//! transition fails, the wrapper is left where it was.
//!
//! # Status Resolution
//!
//! Blocks that were not obtained through consensus (fetched, parsed, or built) are classified by
//! a [Resolver]:
//!
//! * [Direct] trusts the status reported by the block.
//! * [Inferred] derives the status from the height of the block and a [HeightIndex] that knows
//!   which block was accepted at every height up to the last accepted block. The derived status
//!   is written back to the block with [crate::Inferable::set_status].
//!
//! # Synchronization
//!
//! All cache state is guarded by a single mutex that every [Cache] operation holds for its entire
//! duration, so concurrent callers can never observe two wrappers for the same [Id]. Each
//! [Wrapper] guards its block with a separate mutex that is never held while the cache state is
//! locked (and vice versa).

use crate::{Block, Id, Status};
use thiserror::Error;

mod cache;
pub use cache::{Cache, Tier};
mod resolver;
pub use resolver::{Direct, Inferred, Resolver};
mod wrapper;
pub use wrapper::Wrapper;

/// Boxed error returned by a collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when interacting with the [Cache] or a [Wrapper].
#[derive(Debug, Error)]
pub enum Error {
    #[error("block not found: {0}")]
    NotFound(Id),
    #[error("failed to fetch block {id}: {source}")]
    Fetch { id: Id, source: BoxError },
    #[error("failed to parse block: {0}")]
    Parse(#[source] BoxError),
    #[error("failed to build block: {0}")]
    Build(#[source] BoxError),
    #[error("failed to get accepted block at height {height} (for {id}): {source}")]
    Index {
        id: Id,
        height: u64,
        source: BoxError,
    },
    #[error("unexpected status for block {id}: {status}")]
    UnexpectedStatus { id: Id, status: Status },
    #[error("failed to verify block {id}: {source}")]
    Verify { id: Id, source: BoxError },
    #[error("failed to accept block {id}: {source}")]
    Accept { id: Id, source: BoxError },
    #[error("failed to reject block {id}: {source}")]
    Reject { id: Id, source: BoxError },
}

impl Error {
    /// Returns true if the error is a cacheable miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

/// Vm is the interface to the state machine that durably stores blocks.
pub trait Vm: Send + Sync + 'static {
    /// Type of block stored by the VM.
    type Block: Block;

    /// Error returned by the VM.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Retrieve the block with the given `id` from storage.
    ///
    /// Returns `Ok(None)` if the block does not exist (a cacheable miss). Any returned block must
    /// not have status [Status::Unknown].
    fn get_block(&self, id: &Id) -> Result<Option<Self::Block>, Self::Error>;

    /// Deserialize a block.
    fn parse_block(&self, bytes: &[u8]) -> Result<Self::Block, Self::Error>;

    /// Build a new block on top of the preferred block.
    ///
    /// The returned block must have status [Status::Processing]: building on the preferred
    /// block never yields a block that has already been decided.
    fn build_block(&self) -> Result<Self::Block, Self::Error>;
}

/// HeightIndex maps heights to the [Id] of the block accepted at that height.
///
/// Implementations must be authoritative for every height less than or equal to the height of
/// the last accepted block.
pub trait HeightIndex: Send + Sync + 'static {
    /// Error returned by the index.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return the [Id] of the block accepted at `height`.
    fn block_id_at_height(&self, height: u64) -> Result<Id, Self::Error>;
}

/// Configuration for [Cache].
///
/// A cache size of `0` disables the corresponding tier: blocks placed in it are dropped
/// immediately (and will be re-fetched on the next lookup).
pub struct Config<V: Vm, R> {
    /// Maximum number of decided (accepted or rejected) blocks to keep.
    pub decided_cache_size: usize,

    /// Maximum number of IDs to remember as missing.
    pub missing_cache_size: usize,

    /// Maximum number of processing blocks to keep before they are verified.
    pub unverified_cache_size: usize,

    /// The last accepted block (the tip of the chain when the cache is created).
    pub last_accepted: V::Block,

    /// The state machine used to fetch, parse, and build blocks.
    pub vm: V,

    /// Strategy used to classify blocks that are not yet in consensus.
    pub resolver: R,
}
