//! Track the lifecycle of consensus items and gate their acceptance on ancestry.
//!
//! This crate sits between a consensus engine and the state machine ("VM") that durably
//! stores its items. It provides two primitives:
//!
//! * [chain::Cache]: resolves any block [Id] to exactly one canonical [chain::Wrapper] and
//!   keeps that wrapper in the tier matching its consensus status (verified, decided, or
//!   unverified), negatively caching IDs the VM reports as missing.
//! * [bootstrap::Parser]: turns serialized DAG vertices into [queue::Job]s that may only be
//!   executed once every parent has been durably accepted.
//!
//! # Status
//!
//! `commonware-lifecycle` is **ALPHA** software and is not yet recommended for production use. Developers should
//! expect breaking changes and occasional instability.

use bytes::Bytes;
use std::fmt;

pub mod bootstrap;
pub mod cacher;
pub mod chain;
pub mod queue;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

/// Length of an [Id] in bytes.
pub const ID_LENGTH: usize = 32;

/// Opaque identifier of a block, vertex, or transaction.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Id([u8; ID_LENGTH]);

impl Id {
    /// The all-zero identifier.
    pub const EMPTY: Self = Self([0; ID_LENGTH]);

    /// Create an [Id] from raw bytes.
    pub const fn new(bytes: [u8; ID_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; ID_LENGTH]> for Id {
    fn from(bytes: [u8; ID_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", commonware_utils::hex(&self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", commonware_utils::hex(&self.0))
    }
}

/// Consensus status of an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Status {
    /// The item has never been seen (or its contents are not available).
    #[default]
    Unknown,
    /// The item is known but not yet decided.
    Processing,
    /// The item was accepted.
    Accepted,
    /// The item was rejected.
    Rejected,
}

impl Status {
    /// Returns true if the item has been accepted or rejected.
    pub fn decided(&self) -> bool {
        matches!(self, Status::Accepted | Status::Rejected)
    }

    /// Returns true if the contents of the item are known.
    pub fn fetched(&self) -> bool {
        !matches!(self, Status::Unknown)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Unknown => "Unknown",
            Status::Processing => "Processing",
            Status::Accepted => "Accepted",
            Status::Rejected => "Rejected",
        };
        f.write_str(name)
    }
}

/// Decidable is the capability set shared by every consensus item (blocks and vertices).
///
/// Read-only methods must not fail. Lifecycle methods (`verify`, `accept`, `reject`) may
/// fail, in which case the caller must not assume any status change occurred.
pub trait Decidable: Send + 'static {
    /// Error returned by lifecycle transitions.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Unique identifier of the item.
    fn id(&self) -> Id;

    /// Serialized form of the item.
    fn bytes(&self) -> Bytes;

    /// Current consensus status of the item.
    fn status(&self) -> Status;

    /// Check that the item is valid (and may be issued into consensus).
    fn verify(&mut self) -> Result<(), Self::Error>;

    /// Mark the item as accepted.
    fn accept(&mut self) -> Result<(), Self::Error>;

    /// Mark the item as rejected.
    fn reject(&mut self) -> Result<(), Self::Error>;
}

/// Block is an item of a linear chain.
pub trait Block: Decidable {
    /// Identifier of the parent block.
    fn parent(&self) -> Id;

    /// Height of the block (the genesis block has height 0).
    fn height(&self) -> u64;
}

/// Inferable is a [Block] whose status may be overwritten by whoever can determine it more
/// reliably than the block itself (e.g. from a height index populated during sync).
pub trait Inferable: Block {
    /// Overwrite the status of the block.
    fn set_status(&mut self, status: Status);
}

/// Transaction is the unit of state change referenced by a [Vertex].
pub trait Transaction: Send + 'static {
    /// Unique identifier of the transaction.
    fn id(&self) -> Id;

    /// Current consensus status of the transaction.
    fn status(&self) -> Status;
}

/// Vertex is an item of a DAG.
pub trait Vertex: Decidable {
    /// Type of transaction included in the vertex.
    type Transaction: Transaction;

    /// Identifiers of the parents of this vertex.
    fn parents(&self) -> Result<Vec<Id>, Self::Error>;

    /// Transactions included in this vertex.
    fn txs(&self) -> Result<Vec<Self::Transaction>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let mut bytes = [0u8; ID_LENGTH];
        bytes[0] = 0xab;
        bytes[ID_LENGTH - 1] = 0x01;
        let id = Id::from(bytes);
        let hex = id.to_string();
        assert_eq!(hex.len(), ID_LENGTH * 2);
        assert!(hex.starts_with("ab00"));
        assert!(hex.ends_with("0001"));
        assert_eq!(format!("{id:?}"), hex);
        assert_eq!(Id::EMPTY, Id::default());
    }

    #[test]
    fn test_status() {
        assert!(!Status::Unknown.decided());
        assert!(!Status::Processing.decided());
        assert!(Status::Accepted.decided());
        assert!(Status::Rejected.decided());

        assert!(!Status::Unknown.fetched());
        assert!(Status::Processing.fetched());
        assert!(Status::Rejected.fetched());

        assert_eq!(Status::Processing.to_string(), "Processing");
        assert_eq!(Status::default(), Status::Unknown);
    }
}
