use super::{Config, Error, Resolver, Vm, Wrapper};
use crate::{
    cacher::{Cacher, Lru, Metered},
    Block, Decidable, Id, Status,
};
use prometheus_client::registry::Registry;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// The location of an [Id] in a [Cache].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    /// Verified and currently in consensus.
    Verified,
    /// Accepted or rejected.
    Decided,
    /// Processing but not yet verified.
    Unverified,
    /// Reported as not found by the VM.
    Missing,
}

/// Mutable state of a [Cache], shared (weakly) with every [Wrapper] it creates.
pub(super) struct State<B: Block> {
    verified: HashMap<Id, Wrapper<B>>,
    decided: Box<dyn Cacher<Id, Wrapper<B>>>,
    unverified: Box<dyn Cacher<Id, Wrapper<B>>>,
    missing: Box<dyn Cacher<Id, ()>>,
    last_accepted: Wrapper<B>,
}

impl<B: Block> State<B> {
    /// Look up the canonical wrapper for `id` in the positive tiers (by priority).
    fn cached(&mut self, id: &Id) -> Option<Wrapper<B>> {
        if let Some(wrapped) = self.verified.get(id) {
            return Some(wrapped.clone());
        }
        if let Some(wrapped) = self.decided.get(id) {
            return Some(wrapped.clone());
        }
        if let Some(wrapped) = self.unverified.get(id) {
            return Some(wrapped.clone());
        }
        if self.last_accepted.id() == *id {
            return Some(self.last_accepted.clone());
        }
        None
    }

    fn is_decided(&self, id: &Id) -> bool {
        self.decided.contains(id) || self.last_accepted.id() == *id
    }

    pub(super) fn verified(&mut self, wrapped: Wrapper<B>, status: Status) {
        let id = wrapped.id();
        if status.decided() || self.is_decided(&id) {
            // A decided block evicted from the decided tier is not retained as verified
            if !self.is_decided(&id) {
                self.unverified.evict(&id);
                self.decided.put(id, wrapped);
            }
            debug!(%id, %status, "ignoring verification of decided block");
            return;
        }
        self.unverified.evict(&id);
        self.verified.insert(id, wrapped);
        debug!(%id, "block verified");
    }

    pub(super) fn accepted(&mut self, wrapped: Wrapper<B>) {
        let id = wrapped.id();
        self.verified.remove(&id);
        self.unverified.evict(&id);
        self.decided.put(id, wrapped.clone());
        self.last_accepted = wrapped;
        debug!(%id, "block accepted");
    }

    pub(super) fn rejected(&mut self, wrapped: Wrapper<B>) {
        let id = wrapped.id();
        self.verified.remove(&id);
        self.unverified.evict(&id);
        self.decided.put(id, wrapped);
        debug!(%id, "block rejected");
    }
}

/// An efficient caching layer in front of a [Vm].
///
/// See the [module documentation](super) for the invariants maintained by [Cache].
pub struct Cache<V: Vm, R: Resolver<V::Block>> {
    vm: V,
    resolver: R,
    state: Arc<Mutex<State<V::Block>>>,
}

impl<V: Vm, R: Resolver<V::Block>> Cache<V, R> {
    /// Create a new cache with unmetered tiers.
    pub fn new(cfg: Config<V, R>) -> Self {
        let decided: Box<dyn Cacher<Id, Wrapper<V::Block>>> =
            Box::new(Lru::new(cfg.decided_cache_size));
        let missing: Box<dyn Cacher<Id, ()>> = Box::new(Lru::new(cfg.missing_cache_size));
        let unverified: Box<dyn Cacher<Id, Wrapper<V::Block>>> =
            Box::new(Lru::new(cfg.unverified_cache_size));
        Self::init(cfg, decided, missing, unverified)
    }

    /// Create a new cache whose bounded tiers report hits and misses to `registry`.
    ///
    /// Metrics are registered under the `decided_cache`, `missing_cache`, and
    /// `unverified_cache` prefixes.
    pub fn metered(cfg: Config<V, R>, registry: &mut Registry) -> Self {
        let decided: Box<dyn Cacher<Id, Wrapper<V::Block>>> = Box::new(Metered::new(
            Lru::new(cfg.decided_cache_size),
            registry.sub_registry_with_prefix("decided_cache"),
        ));
        let missing: Box<dyn Cacher<Id, ()>> = Box::new(Metered::new(
            Lru::new(cfg.missing_cache_size),
            registry.sub_registry_with_prefix("missing_cache"),
        ));
        let unverified: Box<dyn Cacher<Id, Wrapper<V::Block>>> = Box::new(Metered::new(
            Lru::new(cfg.unverified_cache_size),
            registry.sub_registry_with_prefix("unverified_cache"),
        ));
        Self::init(cfg, decided, missing, unverified)
    }

    fn init(
        cfg: Config<V, R>,
        mut decided: Box<dyn Cacher<Id, Wrapper<V::Block>>>,
        missing: Box<dyn Cacher<Id, ()>>,
        unverified: Box<dyn Cacher<Id, Wrapper<V::Block>>>,
    ) -> Self {
        let Config {
            last_accepted,
            vm,
            resolver,
            ..
        } = cfg;
        let state = Arc::new_cyclic(|cache| {
            let last_accepted = Wrapper::new(last_accepted, cache.clone());
            decided.put(last_accepted.id(), last_accepted.clone());
            Mutex::new(State {
                verified: HashMap::new(),
                decided,
                unverified,
                missing,
                last_accepted,
            })
        });
        Self {
            vm,
            resolver,
            state,
        }
    }

    /// Return the canonical wrapper for `id`.
    ///
    /// If the block is not cached, it is fetched from the [Vm]. If the [Vm] reports the block as
    /// missing, the miss is cached and [Error::NotFound] is returned (without consulting the
    /// [Vm]) until the block is parsed or built.
    pub fn get_block(&self, id: &Id) -> Result<Wrapper<V::Block>, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(wrapped) = state.cached(id) {
            return Ok(wrapped);
        }
        if state.missing.get(id).is_some() {
            return Err(Error::NotFound(*id));
        }

        match self.vm.get_block(id) {
            Ok(Some(block)) => self.classify(&mut state, block),
            Ok(None) => {
                state.missing.put(*id, ());
                debug!(%id, "block missing");
                Err(Error::NotFound(*id))
            }
            Err(err) => Err(Error::Fetch {
                id: *id,
                source: err.into(),
            }),
        }
    }

    /// Return a copy of the underlying block for `id`.
    ///
    /// The copy does not observe later transitions made through the canonical [Wrapper]. Use
    /// [Wrapper::inner] to access the canonical block.
    pub fn get_block_internal(&self, id: &Id) -> Result<V::Block, Error>
    where
        V::Block: Clone,
    {
        let wrapped = self.get_block(id)?;
        let block = wrapped.inner().clone();
        Ok(block)
    }

    /// Parse `bytes` into a block and return its canonical wrapper.
    ///
    /// If a wrapper for the parsed block already exists, the freshly parsed block is dropped and
    /// the existing wrapper is returned.
    pub fn parse_block(&self, bytes: &[u8]) -> Result<Wrapper<V::Block>, Error> {
        let block = self
            .vm
            .parse_block(bytes)
            .map_err(|err| Error::Parse(err.into()))?;
        let mut state = self.state.lock().unwrap();
        self.add(&mut state, block)
    }

    /// Build a new block and return its canonical wrapper.
    ///
    /// The [Vm] is invoked without holding the cache lock (so it may look up blocks through the
    /// cache while building).
    pub fn build_block(&self) -> Result<Wrapper<V::Block>, Error> {
        let block = self
            .vm
            .build_block()
            .map_err(|err| Error::Build(err.into()))?;
        let mut state = self.state.lock().unwrap();
        self.add(&mut state, block)
    }

    /// Remove all decided, unverified, and missing entries.
    ///
    /// Verified blocks and the last accepted block are retained.
    pub fn flush_caches(&self) {
        let mut state = self.state.lock().unwrap();
        state.decided.flush();
        state.missing.flush();
        state.unverified.flush();
        debug!("flushed caches");
    }

    /// Return the [Id] of the last accepted block.
    pub fn last_accepted(&self) -> Id {
        self.state.lock().unwrap().last_accepted.id()
    }

    /// Return the canonical wrapper of the last accepted block.
    pub fn last_accepted_block(&self) -> Wrapper<V::Block> {
        self.state.lock().unwrap().last_accepted.clone()
    }

    /// Return the tier currently holding `id` (if any).
    ///
    /// Inspecting a tier does not affect its replacement order.
    pub fn tier(&self, id: &Id) -> Option<Tier> {
        let state = self.state.lock().unwrap();
        if state.verified.contains_key(id) {
            Some(Tier::Verified)
        } else if state.is_decided(id) {
            Some(Tier::Decided)
        } else if state.unverified.contains(id) {
            Some(Tier::Unverified)
        } else if state.missing.contains(id) {
            Some(Tier::Missing)
        } else {
            None
        }
    }

    /// Return the existing wrapper for `block` or classify it (clearing any cached miss).
    fn add(
        &self,
        state: &mut State<V::Block>,
        block: V::Block,
    ) -> Result<Wrapper<V::Block>, Error> {
        let id = block.id();
        if let Some(wrapped) = state.cached(&id) {
            return Ok(wrapped);
        }
        state.missing.evict(&id);
        self.classify(state, block)
    }

    /// Wrap a block that is not in consensus and place it in the tier matching its status.
    fn classify(
        &self,
        state: &mut State<V::Block>,
        mut block: V::Block,
    ) -> Result<Wrapper<V::Block>, Error> {
        let id = block.id();
        let status = self
            .resolver
            .status(&mut block, state.last_accepted.height())?;
        let wrapped = Wrapper::new(block, Arc::downgrade(&self.state));
        match status {
            Status::Accepted | Status::Rejected => {
                state.decided.put(id, wrapped.clone());
            }
            Status::Processing => {
                state.unverified.put(id, wrapped.clone());
            }
            Status::Unknown => return Err(Error::UnexpectedStatus { id, status }),
        }
        debug!(%id, %status, "classified block");
        Ok(wrapped)
    }
}
