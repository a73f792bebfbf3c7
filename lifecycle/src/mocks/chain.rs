//! Mock blocks, VM, and height index.

use super::Error;
use crate::{Decidable, Id, Inferable, Status, ID_LENGTH};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

const ENCODED_LENGTH: usize = ID_LENGTH + ID_LENGTH + 8 + 1 + 1;

/// Result of the lifecycle transitions of a mock [Block].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Succeed,
    FailVerify,
    FailAccept,
    FailReject,
}

impl Outcome {
    fn to_byte(self) -> u8 {
        match self {
            Outcome::Succeed => 0,
            Outcome::FailVerify => 1,
            Outcome::FailAccept => 2,
            Outcome::FailReject => 3,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Outcome::Succeed),
            1 => Some(Outcome::FailVerify),
            2 => Some(Outcome::FailAccept),
            3 => Some(Outcome::FailReject),
            _ => None,
        }
    }
}

pub(crate) fn status_to_byte(status: Status) -> u8 {
    match status {
        Status::Unknown => 0,
        Status::Processing => 1,
        Status::Accepted => 2,
        Status::Rejected => 3,
    }
}

pub(crate) fn status_from_byte(byte: u8) -> Option<Status> {
    match byte {
        0 => Some(Status::Unknown),
        1 => Some(Status::Processing),
        2 => Some(Status::Accepted),
        3 => Some(Status::Rejected),
        _ => None,
    }
}

/// A block whose status and transition outcomes are controlled by the test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    id: Id,
    parent: Id,
    height: u64,
    status: Status,
    outcome: Outcome,
}

impl Block {
    pub fn new(id: Id, parent: Id, height: u64, status: Status) -> Self {
        Self {
            id,
            parent,
            height,
            status,
            outcome: Outcome::Succeed,
        }
    }

    /// Configure the outcome of lifecycle transitions.
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    fn decode(mut buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != ENCODED_LENGTH {
            return Err(Error::Malformed);
        }
        let mut id = [0u8; ID_LENGTH];
        buf.copy_to_slice(&mut id);
        let mut parent = [0u8; ID_LENGTH];
        buf.copy_to_slice(&mut parent);
        let height = buf.get_u64();
        let status = status_from_byte(buf.get_u8()).ok_or(Error::Malformed)?;
        let outcome = Outcome::from_byte(buf.get_u8()).ok_or(Error::Malformed)?;
        Ok(Self {
            id: Id::from(id),
            parent: Id::from(parent),
            height,
            status,
            outcome,
        })
    }
}

impl Decidable for Block {
    type Error = Error;

    fn id(&self) -> Id {
        self.id
    }

    fn bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ENCODED_LENGTH);
        buf.put_slice(self.id.as_ref());
        buf.put_slice(self.parent.as_ref());
        buf.put_u64(self.height);
        buf.put_u8(status_to_byte(self.status));
        buf.put_u8(self.outcome.to_byte());
        buf.freeze()
    }

    fn status(&self) -> Status {
        self.status
    }

    fn verify(&mut self) -> Result<(), Error> {
        if self.outcome == Outcome::FailVerify {
            return Err(Error::Injected);
        }
        Ok(())
    }

    fn accept(&mut self) -> Result<(), Error> {
        if self.outcome == Outcome::FailAccept {
            return Err(Error::Injected);
        }
        self.status = Status::Accepted;
        Ok(())
    }

    fn reject(&mut self) -> Result<(), Error> {
        if self.outcome == Outcome::FailReject {
            return Err(Error::Injected);
        }
        self.status = Status::Rejected;
        Ok(())
    }
}

impl crate::Block for Block {
    fn parent(&self) -> Id {
        self.parent
    }

    fn height(&self) -> u64 {
        self.height
    }
}

impl Inferable for Block {
    fn set_status(&mut self, status: Status) {
        self.status = status;
    }
}

#[derive(Default)]
struct State {
    blocks: HashMap<Id, Block>,
    next_build: Option<Block>,
    fail_gets: bool,
    get_calls: usize,
}

/// A VM storing blocks in memory.
///
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct Vm {
    state: Arc<Mutex<State>>,
}

impl Vm {
    /// Store `block`.
    pub fn insert(&self, block: Block) {
        let mut state = self.state.lock().unwrap();
        state.blocks.insert(block.id(), block);
    }

    /// Set the block returned by the next call to `build_block`.
    pub fn set_next_build(&self, block: Block) {
        self.state.lock().unwrap().next_build = Some(block);
    }

    /// Make every call to `get_block` fail.
    pub fn fail_gets(&self, fail: bool) {
        self.state.lock().unwrap().fail_gets = fail;
    }

    /// Number of calls made to `get_block`.
    pub fn get_calls(&self) -> usize {
        self.state.lock().unwrap().get_calls
    }
}

impl crate::chain::Vm for Vm {
    type Block = Block;
    type Error = Error;

    fn get_block(&self, id: &Id) -> Result<Option<Block>, Error> {
        let mut state = self.state.lock().unwrap();
        state.get_calls += 1;
        if state.fail_gets {
            return Err(Error::Injected);
        }
        Ok(state.blocks.get(id).cloned())
    }

    fn parse_block(&self, bytes: &[u8]) -> Result<Block, Error> {
        Block::decode(bytes)
    }

    fn build_block(&self) -> Result<Block, Error> {
        self.state
            .lock()
            .unwrap()
            .next_build
            .take()
            .ok_or(Error::NothingToBuild)
    }
}

/// A height index populated by the test.
///
/// Clones share the same index.
#[derive(Clone, Debug, Default)]
pub struct Index {
    accepted: Arc<Mutex<HashMap<u64, Id>>>,
}

impl Index {
    /// Record `id` as the block accepted at `height`.
    pub fn set(&self, height: u64, id: Id) {
        self.accepted.lock().unwrap().insert(height, id);
    }
}

impl crate::chain::HeightIndex for Index {
    type Error = Error;

    fn block_id_at_height(&self, height: u64) -> Result<Id, Error> {
        self.accepted
            .lock()
            .unwrap()
            .get(&height)
            .copied()
            .ok_or(Error::Unindexed(height))
    }
}
