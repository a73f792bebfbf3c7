//! Replay serialized DAG vertices in topological order.
//!
//! During bootstrap, a node downloads vertices it has not yet accepted and must accept them in an
//! order that respects the DAG (no vertex before its parents) without holding the whole DAG in
//! memory. [Parser] turns each serialized vertex into a [Job] that a [crate::queue] scheduler
//! can hold until [crate::queue::Job::missing_dependencies] is empty and then execute.
//!
//! # Execution
//!
//! When executed, a [Job]:
//!
//! 1. Recomputes its missing dependencies and fails (counting the vertex as dropped) if any
//!    remain.
//! 2. Skips the vertex (counting it as dropped, but returning success) if any of its transactions
//!    is not yet accepted. The vertex stays unaccepted so a later pass can retry it.
//! 3. Fails (counting the vertex as dropped) if the vertex is [crate::Status::Unknown] or
//!    [crate::Status::Rejected].
//! 4. Accepts and persists (via [Manager::save_vertex]) a [crate::Status::Processing] vertex.
//!    An already accepted vertex is left untouched.

use crate::{Id, Status, Vertex};
use thiserror::Error;

mod job;
pub use job::{Job, Parser};
mod metrics;
pub use metrics::Metrics;

/// Boxed error returned by a [Manager] or [Vertex].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur when parsing or executing a [Job].
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse vertex: {0}")]
    Parse(#[source] BoxError),
    #[error("failed to get parents of vertex {id}: {source}")]
    Parents { id: Id, source: BoxError },
    #[error("failed to get transactions of vertex {id}: {source}")]
    Transactions { id: Id, source: BoxError },
    #[error("attempting to execute blocked vertex {id} ({missing} missing dependencies)")]
    Blocked { id: Id, missing: usize },
    #[error("attempting to execute vertex {id} with status {status}")]
    InvalidStatus { id: Id, status: Status },
    #[error("failed to accept vertex {id} in bootstrapping: {source}")]
    Accept { id: Id, source: BoxError },
    #[error("failed to save vertex {id} to the database: {source}")]
    Save { id: Id, source: BoxError },
}

/// Manager is the interface to the state machine that durably stores vertices.
///
/// A single manager is shared by every [Job] of a DAG and must tolerate sequential calls from
/// different jobs.
pub trait Manager: Send + Sync + 'static {
    /// Type of vertex stored by the manager.
    type Vertex: Vertex;

    /// Error returned by the manager.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Deserialize a vertex.
    fn parse_vertex(&self, bytes: &[u8]) -> Result<Self::Vertex, Self::Error>;

    /// Retrieve a vertex by its `id`.
    fn get_vertex(&self, id: &Id) -> Result<Self::Vertex, Self::Error>;

    /// Durably persist a vertex (including its status).
    fn save_vertex(&self, vertex: &Self::Vertex) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{self, dag::Outcome},
        queue::{Job as _, Parser as _},
        Decidable,
    };
    use commonware_macros::test_traced;
    use prometheus_client::{encoding::text::encode, registry::Registry};
    use std::{collections::BTreeSet, sync::Arc};

    fn setup() -> (Arc<mocks::dag::Manager>, Parser<mocks::dag::Manager>, Metrics) {
        let manager = Arc::new(mocks::dag::Manager::default());
        let metrics = Metrics::default();
        let parser = Parser::new(manager.clone(), metrics.clone());
        (manager, parser, metrics)
    }

    fn accepted_tx(seed: u64) -> mocks::dag::Transaction {
        mocks::dag::Transaction::new(mocks::id(seed), Status::Accepted)
    }

    #[test_traced]
    fn test_parse_failure() {
        let (_, parser, _) = setup();
        assert!(matches!(parser.parse(b"garbage"), Err(Error::Parse(_))));
    }

    #[test_traced]
    fn test_bytes_are_preserved() {
        let (_, parser, _) = setup();
        let vertex = mocks::dag::Vertex::new(
            mocks::id(1),
            vec![mocks::id(0)],
            vec![accepted_tx(100)],
            Status::Processing,
        );
        let bytes = vertex.bytes();
        let job = parser.parse(&bytes).unwrap();
        assert_eq!(job.id(), vertex.id());
        assert_eq!(job.bytes(), bytes);
        assert_eq!(job.vertex(), &vertex);

        // Re-submitting the bytes yields an equivalent job
        let again = parser.parse(&job.bytes()).unwrap();
        assert_eq!(again.id(), job.id());
    }

    #[test_traced]
    fn test_missing_dependencies() {
        let (manager, parser, _) = setup();
        let accepted = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], Status::Accepted);
        let processing =
            mocks::dag::Vertex::new(mocks::id(2), vec![], vec![], Status::Processing);
        let unknown = mocks::id(3);
        manager.insert(accepted.clone());
        manager.insert(processing.clone());

        let vertex = mocks::dag::Vertex::new(
            mocks::id(4),
            vec![accepted.id(), processing.id(), unknown],
            vec![],
            Status::Processing,
        );
        let job = parser.parse(&vertex.bytes()).unwrap();
        let missing = job.missing_dependencies().unwrap();
        assert_eq!(missing, BTreeSet::from([processing.id(), unknown]));

        // Dependencies are recomputed on every call
        let mut parent = processing.clone();
        parent.accept().unwrap();
        manager.insert(parent);
        assert_eq!(
            job.missing_dependencies().unwrap(),
            BTreeSet::from([unknown])
        );
        manager.insert(mocks::dag::Vertex::new(unknown, vec![], vec![], Status::Accepted));
        assert!(job.missing_dependencies().unwrap().is_empty());
    }

    #[test_traced]
    fn test_parents_failure() {
        let (_, parser, metrics) = setup();
        let vertex = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], Status::Processing)
            .with_outcome(Outcome::FailParents);
        let mut job = parser.parse(&vertex.bytes()).unwrap();
        assert!(matches!(
            job.missing_dependencies(),
            Err(Error::Parents { id, .. }) if id == vertex.id()
        ));
        assert!(matches!(job.execute(), Err(Error::Parents { .. })));
        assert_eq!(metrics.dropped.get(), 0);
    }

    #[test_traced]
    fn test_execute_transactions_failure() {
        let (manager, parser, metrics) = setup();
        let vertex = mocks::dag::Vertex::new(
            mocks::id(1),
            vec![],
            vec![accepted_tx(100)],
            Status::Processing,
        )
        .with_outcome(Outcome::FailTxs);
        let mut job = parser.parse(&vertex.bytes()).unwrap();

        let err = job.execute().unwrap_err();
        assert!(matches!(err, Error::Transactions { id, .. } if id == vertex.id()));
        assert_eq!(job.vertex().status(), Status::Processing);
        assert_eq!(metrics.accepted.get(), 0);
        assert_eq!(metrics.dropped.get(), 0);
        assert!(manager.saved().is_empty());
    }

    #[test_traced]
    fn test_execute_blocked() {
        let (manager, parser, metrics) = setup();
        let parent = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], Status::Processing);
        manager.insert(parent.clone());
        let vertex = mocks::dag::Vertex::new(
            mocks::id(2),
            vec![parent.id()],
            vec![],
            Status::Processing,
        );
        let mut job = parser.parse(&vertex.bytes()).unwrap();

        let err = job.execute().unwrap_err();
        assert!(matches!(err, Error::Blocked { id, missing: 1 } if id == vertex.id()));
        assert_eq!(metrics.dropped.get(), 1);
        assert_eq!(metrics.accepted.get(), 0);
        assert_eq!(job.vertex().status(), Status::Processing);
        assert!(manager.saved().is_empty());
    }

    #[test_traced]
    fn test_execute_skips_unaccepted_transactions() {
        let (manager, parser, metrics) = setup();
        let vertex = mocks::dag::Vertex::new(
            mocks::id(1),
            vec![],
            vec![
                accepted_tx(100),
                mocks::dag::Transaction::new(mocks::id(101), Status::Processing),
            ],
            Status::Processing,
        );
        let mut job = parser.parse(&vertex.bytes()).unwrap();

        job.execute().unwrap();
        assert_eq!(job.vertex().status(), Status::Processing);
        assert_eq!(metrics.dropped.get(), 1);
        assert_eq!(metrics.accepted.get(), 0);
        assert!(manager.saved().is_empty());
    }

    #[test_traced]
    fn test_execute_invalid_status() {
        for status in [Status::Unknown, Status::Rejected] {
            let (manager, parser, metrics) = setup();
            let vertex = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], status);
            let mut job = parser.parse(&vertex.bytes()).unwrap();

            let err = job.execute().unwrap_err();
            assert!(
                matches!(err, Error::InvalidStatus { id, status: found } if id == vertex.id() && found == status)
            );
            assert_eq!(metrics.dropped.get(), 1);
            assert!(manager.saved().is_empty());
        }
    }

    #[test_traced]
    fn test_execute_accepts_and_saves() {
        let (manager, parser, metrics) = setup();
        let parent = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], Status::Accepted);
        manager.insert(parent.clone());
        let vertex = mocks::dag::Vertex::new(
            mocks::id(2),
            vec![parent.id()],
            vec![accepted_tx(100)],
            Status::Processing,
        );
        let mut job = parser.parse(&vertex.bytes()).unwrap();

        job.execute().unwrap();
        assert_eq!(job.vertex().status(), Status::Accepted);
        assert_eq!(metrics.accepted.get(), 1);
        assert_eq!(metrics.dropped.get(), 0);
        assert_eq!(manager.saved(), vec![vertex.id()]);
        assert_eq!(
            manager.get(&vertex.id()).map(|v| v.status()),
            Some(Status::Accepted)
        );
    }

    #[test_traced]
    fn test_execute_already_accepted() {
        let (manager, parser, metrics) = setup();
        let vertex = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], Status::Accepted);
        let mut job = parser.parse(&vertex.bytes()).unwrap();

        job.execute().unwrap();
        assert_eq!(metrics.accepted.get(), 0);
        assert_eq!(metrics.dropped.get(), 0);
        assert!(manager.saved().is_empty());
    }

    #[test_traced]
    fn test_execute_accept_and_save_failures() {
        let (manager, parser, _) = setup();
        let vertex = mocks::dag::Vertex::new(mocks::id(1), vec![], vec![], Status::Processing)
            .with_outcome(Outcome::FailAccept);
        let mut job = parser.parse(&vertex.bytes()).unwrap();
        let err = job.execute().unwrap_err();
        assert!(matches!(err, Error::Accept { id, .. } if id == vertex.id()));
        assert!(err.to_string().contains(&vertex.id().to_string()));
        assert!(manager.saved().is_empty());

        let vertex = mocks::dag::Vertex::new(mocks::id(2), vec![], vec![], Status::Processing);
        manager.fail_saves(true);
        let mut job = parser.parse(&vertex.bytes()).unwrap();
        let err = job.execute().unwrap_err();
        assert!(matches!(err, Error::Save { id, .. } if id == vertex.id()));
        assert!(err.to_string().contains(&vertex.id().to_string()));
    }

    #[test_traced]
    fn test_replay_in_dependency_order() {
        let manager = Arc::new(mocks::dag::Manager::default());
        let mut registry = Registry::default();
        let metrics = Metrics::init(&mut registry);
        let parser = Parser::new(manager.clone(), metrics.clone());

        // Build a diamond on top of an accepted root:
        //
        //      root
        //     /    \
        //    a      b
        //     \    /
        //       c
        //       |
        //       d
        let root = mocks::dag::Vertex::new(mocks::id(0), vec![], vec![], Status::Accepted);
        manager.insert(root.clone());
        let a = mocks::dag::Vertex::new(
            mocks::id(1),
            vec![root.id()],
            vec![accepted_tx(10)],
            Status::Processing,
        );
        let b = mocks::dag::Vertex::new(
            mocks::id(2),
            vec![root.id()],
            vec![accepted_tx(11)],
            Status::Processing,
        );
        let c = mocks::dag::Vertex::new(
            mocks::id(3),
            vec![a.id(), b.id()],
            vec![accepted_tx(12)],
            Status::Processing,
        );
        let d = mocks::dag::Vertex::new(mocks::id(4), vec![c.id()], vec![], Status::Processing);

        // Submit the vertices in reverse order and drive them like a scheduler would
        let mut pending = [&d, &c, &b, &a]
            .into_iter()
            .map(|vertex| parser.parse(&vertex.bytes()).unwrap())
            .collect::<Vec<_>>();
        while !pending.is_empty() {
            let ready = pending
                .iter()
                .position(|job| job.missing_dependencies().unwrap().is_empty())
                .expect("no job is ready");
            let mut job = pending.remove(ready);
            job.execute().unwrap();
        }

        // Every vertex was saved after its parents
        let saved = manager.saved();
        assert_eq!(saved.len(), 4);
        let position = |id: Id| saved.iter().position(|saved| *saved == id).unwrap();
        assert!(position(a.id()) < position(c.id()));
        assert!(position(b.id()) < position(c.id()));
        assert!(position(c.id()) < position(d.id()));
        assert_eq!(metrics.accepted.get(), 4);
        assert_eq!(metrics.dropped.get(), 0);

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("accepted_total 4"));
        assert!(buffer.contains("dropped_total 0"));
    }
}
