use super::{Error, HeightIndex};
use crate::{Block, Inferable, Status};

/// Resolver determines the status of a block that is not yet tracked by consensus.
pub trait Resolver<B: Block>: Send + Sync + 'static {
    /// Return the status of `block`, given the height of the last accepted block.
    ///
    /// Implementations may update the status stored in `block` as a side effect.
    fn status(&self, block: &mut B, last_accepted_height: u64) -> Result<Status, Error>;
}

/// Trust the status reported by the block.
///
/// Suitable when the [super::Vm] always returns blocks that already carry their correct status.
#[derive(Clone, Copy, Debug, Default)]
pub struct Direct;

impl<B: Block> Resolver<B> for Direct {
    fn status(&self, block: &mut B, _: u64) -> Result<Status, Error> {
        Ok(block.status())
    }
}

/// Infer the status of a block from its height.
///
/// Given a block at height `h` and a last accepted block at height `l`:
///
/// * If `h > l`, the block cannot be decided yet and is [Status::Processing].
/// * Otherwise, the block is [Status::Accepted] if the [HeightIndex] reports it as the block
///   accepted at `h` and [Status::Rejected] if another block was accepted at `h`.
///
/// The inferred status is written back to the block with [Inferable::set_status]. If the index
/// cannot answer for some `h <= l` (i.e. it has a gap), the error is returned rather than
/// guessing a status.
#[derive(Clone, Debug)]
pub struct Inferred<I: HeightIndex> {
    index: I,
}

impl<I: HeightIndex> Inferred<I> {
    /// Create a new resolver backed by `index`.
    pub fn new(index: I) -> Self {
        Self { index }
    }
}

impl<B: Inferable, I: HeightIndex> Resolver<B> for Inferred<I> {
    fn status(&self, block: &mut B, last_accepted_height: u64) -> Result<Status, Error> {
        let height = block.height();
        if height > last_accepted_height {
            block.set_status(Status::Processing);
            return Ok(Status::Processing);
        }

        let id = block.id();
        let accepted = self
            .index
            .block_id_at_height(height)
            .map_err(|err| Error::Index {
                id,
                height,
                source: err.into(),
            })?;
        let status = if accepted == id {
            Status::Accepted
        } else {
            Status::Rejected
        };
        block.set_status(status);
        Ok(status)
    }
}
