use super::{Error, Manager, Metrics};
use crate::{queue, Decidable, Id, Status, Transaction as _, Vertex as _};
use bytes::Bytes;
use std::{collections::BTreeSet, sync::Arc};
use tracing::{debug, warn};

/// Parses serialized vertices into [Job]s.
pub struct Parser<M: Manager> {
    manager: Arc<M>,
    metrics: Metrics,
}

impl<M: Manager> Parser<M> {
    /// Create a new parser producing jobs that share `manager` and `metrics`.
    pub fn new(manager: Arc<M>, metrics: Metrics) -> Self {
        Self { manager, metrics }
    }
}

impl<M: Manager> queue::Parser for Parser<M> {
    type Job = Job<M>;
    type Error = Error;

    fn parse(&self, bytes: &[u8]) -> Result<Job<M>, Error> {
        let vertex = self
            .manager
            .parse_vertex(bytes)
            .map_err(|err| Error::Parse(err.into()))?;
        Ok(Job {
            vertex,
            manager: self.manager.clone(),
            metrics: self.metrics.clone(),
        })
    }
}

/// Accepts a single vertex once all of its parents have been accepted.
pub struct Job<M: Manager> {
    vertex: M::Vertex,
    manager: Arc<M>,
    metrics: Metrics,
}

impl<M: Manager> Job<M> {
    /// The vertex to accept.
    pub fn vertex(&self) -> &M::Vertex {
        &self.vertex
    }
}

impl<M: Manager> queue::Job for Job<M> {
    type Error = Error;

    fn id(&self) -> Id {
        self.vertex.id()
    }

    /// A parent is missing if it cannot be fetched or if it is not yet accepted.
    fn missing_dependencies(&self) -> Result<BTreeSet<Id>, Error> {
        let id = self.vertex.id();
        let parents = self.vertex.parents().map_err(|err| Error::Parents {
            id,
            source: err.into(),
        })?;

        let mut missing = BTreeSet::new();
        for parent in parents {
            match self.manager.get_vertex(&parent) {
                Ok(vertex) if vertex.status() == Status::Accepted => {}
                Ok(vertex) => {
                    debug!(%id, %parent, status = %vertex.status(), "parent not accepted");
                    missing.insert(parent);
                }
                Err(err) => {
                    debug!(%id, %parent, ?err, "parent unavailable");
                    missing.insert(parent);
                }
            }
        }
        Ok(missing)
    }

    fn execute(&mut self) -> Result<(), Error> {
        // The scheduler should only execute jobs without missing dependencies, however,
        // other jobs may have run since it last checked.
        let id = self.vertex.id();
        let missing = self.missing_dependencies()?;
        if !missing.is_empty() {
            self.metrics.dropped.inc();
            return Err(Error::Blocked {
                id,
                missing: missing.len(),
            });
        }

        let txs = self.vertex.txs().map_err(|err| Error::Transactions {
            id,
            source: err.into(),
        })?;
        if let Some(tx) = txs.iter().find(|tx| tx.status() != Status::Accepted) {
            // Leave the vertex unaccepted so it can be retried once its transactions settle
            self.metrics.dropped.inc();
            warn!(
                %id,
                tx = %tx.id(),
                status = %tx.status(),
                "attempting to execute vertex with non-accepted transactions"
            );
            return Ok(());
        }

        match self.vertex.status() {
            status @ (Status::Unknown | Status::Rejected) => {
                self.metrics.dropped.inc();
                Err(Error::InvalidStatus { id, status })
            }
            Status::Processing => {
                self.metrics.accepted.inc();
                self.vertex.accept().map_err(|err| Error::Accept {
                    id,
                    source: err.into(),
                })?;
                self.manager
                    .save_vertex(&self.vertex)
                    .map_err(|err| Error::Save {
                        id,
                        source: err.into(),
                    })?;
                debug!(%id, "accepted vertex");
                Ok(())
            }
            Status::Accepted => Ok(()),
        }
    }

    fn bytes(&self) -> Bytes {
        self.vertex.bytes()
    }
}
