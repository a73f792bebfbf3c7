//! Interface between dependency-gated work and the scheduler that drives it.
//!
//! The scheduler itself (which persists pending jobs, tracks which jobs are blocked on which
//! dependencies, and invokes [Job::execute] once they clear) lives outside of this crate. It
//! only relies on the contract below:
//!
//! * [Job::missing_dependencies] is recomputed on every call and may shrink as other jobs
//!   execute.
//! * [Job::execute] should only be invoked once [Job::missing_dependencies] is empty. Jobs
//!   check again when executed and fail if the scheduler violates this.
//! * [Job::bytes] can be handed back to [Parser::parse] to reconstruct the job (e.g. after a
//!   restart).

use crate::Id;
use bytes::Bytes;
use std::collections::BTreeSet;

/// A unit of work that can only be executed once its dependencies are satisfied.
pub trait Job: Send + 'static {
    /// Error returned when computing dependencies or executing the job.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Unique identifier of the job.
    fn id(&self) -> Id;

    /// Identifiers of the dependencies that are not yet satisfied.
    fn missing_dependencies(&self) -> Result<BTreeSet<Id>, Self::Error>;

    /// Execute the job.
    fn execute(&mut self) -> Result<(), Self::Error>;

    /// Serialized form of the job.
    fn bytes(&self) -> Bytes;
}

/// Reconstructs [Job]s from their serialized form.
pub trait Parser: Send + 'static {
    /// Type of job produced.
    type Job: Job;

    /// Error returned when the bytes cannot be parsed.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Parse `bytes` into a job.
    fn parse(&self, bytes: &[u8]) -> Result<Self::Job, Self::Error>;
}
