use super::{cache::State, Error};
use crate::{Block, Id, Status};
use bytes::Bytes;
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, Weak},
};

struct Shared<B: Block> {
    id: Id,
    height: u64,
    block: Mutex<B>,
    cache: Weak<Mutex<State<B>>>,
}

/// The canonical in-memory representation of a [Block].
///
/// Cloning a [Wrapper] yields another handle to the same block (use [Wrapper::same] to compare
/// identity). Read-only methods are delegated to the block unchanged. Lifecycle transitions are
/// delegated to the block and, if they succeed, reported to the [super::Cache] that created the
/// wrapper so it can move the block to the matching tier.
pub struct Wrapper<B: Block> {
    shared: Arc<Shared<B>>,
}

impl<B: Block> Clone for Wrapper<B> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<B: Block> fmt::Debug for Wrapper<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("id", &self.shared.id)
            .field("height", &self.shared.height)
            .finish()
    }
}

impl<B: Block> Wrapper<B> {
    pub(super) fn new(block: B, cache: Weak<Mutex<State<B>>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: block.id(),
                height: block.height(),
                block: Mutex::new(block),
                cache,
            }),
        }
    }

    /// Returns true if both handles refer to the same canonical wrapper.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Access the underlying block.
    ///
    /// Lifecycle transitions made through the returned guard bypass the cache and will not
    /// update tier placement.
    pub fn inner(&self) -> MutexGuard<'_, B> {
        self.shared.block.lock().unwrap()
    }

    /// Identifier of the block.
    pub fn id(&self) -> Id {
        self.shared.id
    }

    /// Height of the block.
    pub fn height(&self) -> u64 {
        self.shared.height
    }

    /// Identifier of the parent block.
    pub fn parent(&self) -> Id {
        self.inner().parent()
    }

    /// Serialized form of the block.
    pub fn bytes(&self) -> Bytes {
        self.inner().bytes()
    }

    /// Current status of the block.
    pub fn status(&self) -> Status {
        self.inner().status()
    }

    /// Verify the block and, if successful, move it into the verified tier.
    ///
    /// Blocks that are already decided stay in (or return to) the decided tier.
    pub fn verify(&self) -> Result<(), Error> {
        let id = self.id();
        let status = {
            let mut block = self.inner();
            block.verify().map_err(|err| Error::Verify {
                id,
                source: err.into(),
            })?;
            block.status()
        };
        if let Some(state) = self.shared.cache.upgrade() {
            state.lock().unwrap().verified(self.clone(), status);
        }
        Ok(())
    }

    /// Accept the block and, if successful, move it into the decided tier and make it the last
    /// accepted block.
    pub fn accept(&self) -> Result<(), Error> {
        let id = self.id();
        self.inner().accept().map_err(|err| Error::Accept {
            id,
            source: err.into(),
        })?;
        if let Some(state) = self.shared.cache.upgrade() {
            state.lock().unwrap().accepted(self.clone());
        }
        Ok(())
    }

    /// Reject the block and, if successful, move it into the decided tier.
    pub fn reject(&self) -> Result<(), Error> {
        let id = self.id();
        self.inner().reject().map_err(|err| Error::Reject {
            id,
            source: err.into(),
        })?;
        if let Some(state) = self.shared.cache.upgrade() {
            state.lock().unwrap().rejected(self.clone());
        }
        Ok(())
    }
}
