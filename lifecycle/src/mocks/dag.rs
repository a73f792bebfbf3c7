//! Mock vertices, transactions, and vertex manager.

use super::{
    chain::{status_from_byte, status_to_byte},
    Error,
};
use crate::{Decidable, Id, Status, ID_LENGTH};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Result of the operations of a mock [Vertex].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Succeed,
    FailParents,
    FailTxs,
    FailAccept,
}

impl Outcome {
    fn to_byte(self) -> u8 {
        match self {
            Outcome::Succeed => 0,
            Outcome::FailParents => 1,
            Outcome::FailTxs => 2,
            Outcome::FailAccept => 3,
        }
    }

    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Outcome::Succeed),
            1 => Some(Outcome::FailParents),
            2 => Some(Outcome::FailTxs),
            3 => Some(Outcome::FailAccept),
            _ => None,
        }
    }
}

/// A transaction with a fixed status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    id: Id,
    status: Status,
}

impl Transaction {
    pub fn new(id: Id, status: Status) -> Self {
        Self { id, status }
    }
}

impl crate::Transaction for Transaction {
    fn id(&self) -> Id {
        self.id
    }

    fn status(&self) -> Status {
        self.status
    }
}

/// A vertex whose status and operation outcomes are controlled by the test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vertex {
    id: Id,
    parents: Vec<Id>,
    txs: Vec<Transaction>,
    status: Status,
    outcome: Outcome,
}

impl Vertex {
    pub fn new(id: Id, parents: Vec<Id>, txs: Vec<Transaction>, status: Status) -> Self {
        Self {
            id,
            parents,
            txs,
            status,
            outcome: Outcome::Succeed,
        }
    }

    /// Configure the outcome of vertex operations.
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    fn read_id(buf: &mut &[u8]) -> Result<Id, Error> {
        if buf.remaining() < ID_LENGTH {
            return Err(Error::Malformed);
        }
        let mut id = [0u8; ID_LENGTH];
        buf.copy_to_slice(&mut id);
        Ok(Id::from(id))
    }

    fn read_count(buf: &mut &[u8]) -> Result<usize, Error> {
        if buf.remaining() < 4 {
            return Err(Error::Malformed);
        }
        Ok(buf.get_u32() as usize)
    }

    fn read_byte(buf: &mut &[u8]) -> Result<u8, Error> {
        if !buf.has_remaining() {
            return Err(Error::Malformed);
        }
        Ok(buf.get_u8())
    }

    fn decode(mut buf: &[u8]) -> Result<Self, Error> {
        let id = Self::read_id(&mut buf)?;
        let status = status_from_byte(Self::read_byte(&mut buf)?).ok_or(Error::Malformed)?;
        let outcome = Outcome::from_byte(Self::read_byte(&mut buf)?).ok_or(Error::Malformed)?;

        let mut parents = Vec::new();
        for _ in 0..Self::read_count(&mut buf)? {
            parents.push(Self::read_id(&mut buf)?);
        }
        let mut txs = Vec::new();
        for _ in 0..Self::read_count(&mut buf)? {
            let id = Self::read_id(&mut buf)?;
            let status = status_from_byte(Self::read_byte(&mut buf)?).ok_or(Error::Malformed)?;
            txs.push(Transaction { id, status });
        }
        if buf.has_remaining() {
            return Err(Error::Malformed);
        }

        Ok(Self {
            id,
            parents,
            txs,
            status,
            outcome,
        })
    }
}

impl Decidable for Vertex {
    type Error = Error;

    fn id(&self) -> Id {
        self.id
    }

    fn bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_slice(self.id.as_ref());
        buf.put_u8(status_to_byte(self.status));
        buf.put_u8(self.outcome.to_byte());
        buf.put_u32(self.parents.len() as u32);
        for parent in &self.parents {
            buf.put_slice(parent.as_ref());
        }
        buf.put_u32(self.txs.len() as u32);
        for tx in &self.txs {
            buf.put_slice(tx.id.as_ref());
            buf.put_u8(status_to_byte(tx.status));
        }
        buf.freeze()
    }

    fn status(&self) -> Status {
        self.status
    }

    fn verify(&mut self) -> Result<(), Error> {
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
        self.status = Status::Rejected;
        Ok(())
    }
}

impl crate::Vertex for Vertex {
    type Transaction = Transaction;

    fn parents(&self) -> Result<Vec<Id>, Error> {
        if self.outcome == Outcome::FailParents {
            return Err(Error::Injected);
        }
        Ok(self.parents.clone())
    }

    fn txs(&self) -> Result<Vec<Transaction>, Error> {
        if self.outcome == Outcome::FailTxs {
            return Err(Error::Injected);
        }
        Ok(self.txs.clone())
    }
}

#[derive(Default)]
struct State {
    vertices: HashMap<Id, Vertex>,
    saved: Vec<Id>,
    fail_saves: bool,
}

/// A vertex manager storing vertices in memory.
///
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct Manager {
    state: Arc<Mutex<State>>,
}

impl Manager {
    /// Store `vertex` without recording it as saved.
    pub fn insert(&self, vertex: Vertex) {
        let mut state = self.state.lock().unwrap();
        state.vertices.insert(vertex.id(), vertex);
    }

    /// Get the stored copy of a vertex.
    pub fn get(&self, id: &Id) -> Option<Vertex> {
        self.state.lock().unwrap().vertices.get(id).cloned()
    }

    /// Identifiers passed to `save_vertex`, in call order.
    pub fn saved(&self) -> Vec<Id> {
        self.state.lock().unwrap().saved.clone()
    }

    /// Make every call to `save_vertex` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }
}

impl crate::bootstrap::Manager for Manager {
    type Vertex = Vertex;
    type Error = Error;

    fn parse_vertex(&self, bytes: &[u8]) -> Result<Vertex, Error> {
        Vertex::decode(bytes)
    }

    fn get_vertex(&self, id: &Id) -> Result<Vertex, Error> {
        self.get(id).ok_or(Error::NotFound(*id))
    }

    fn save_vertex(&self, vertex: &Vertex) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            return Err(Error::Injected);
        }
        state.vertices.insert(vertex.id(), vertex.clone());
        state.saved.push(vertex.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bootstrap::Manager as _, mocks};

    #[test]
    fn test_decode_rejects_malformed() {
        let manager = Manager::default();
        let vertex = Vertex::new(
            mocks::id(1),
            vec![mocks::id(0)],
            vec![Transaction::new(mocks::id(2), Status::Accepted)],
            Status::Processing,
        );
        let bytes = vertex.bytes();
        assert_eq!(manager.parse_vertex(&bytes).unwrap(), vertex);
        assert_eq!(
            manager.parse_vertex(&bytes[..bytes.len() - 1]),
            Err(Error::Malformed)
        );
        let mut extended = bytes.to_vec();
        extended.push(0);
        assert_eq!(manager.parse_vertex(&extended), Err(Error::Malformed));
    }
}
