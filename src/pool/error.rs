use std::{fmt, sync::Arc};

/// Any error a job's work can hand back
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A job error that can be cloned into aggregates while the job keeps its own copy
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors a single job can end with
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
  /// The job's work returned an error
  #[error("{0}")]
  Work(SharedError),

  /// The caller could not list the partitions to fan out over.
  ///
  /// Only ever set on a job built with [`super::Job::failed`].
  #[error("could not enumerate partitions: {0}")]
  Enumeration(SharedError),

  /// The pool's cancellation token fired before this job started
  #[error("cancelled before starting")]
  Cancelled,

  /// The pool's deadline passed before this job started
  #[error("deadline passed before starting")]
  DeadlineExceeded,

  /// The job's work panicked
  #[error("panicked: {0}")]
  Panicked(String),
}

impl Error {
  /// Wrap an error returned by a job's work
  pub fn work(e: impl Into<BoxError>) -> Self {
    Self::Work(Arc::from(e.into()))
  }

  /// Wrap a failure to list partitions
  pub fn enumeration(e: impl Into<BoxError>) -> Self {
    Self::Enumeration(Arc::from(e.into()))
  }
}

/// Invalid pool parameters, reported before any work runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
  /// A pool must be allowed to run at least one job at a time
  #[error("concurrency limit must be at least 1")]
  ZeroConcurrency,
}

/// One failed job inside an [`AggregateError`]
#[derive(Clone, Debug)]
pub struct JobFailure {
  /// Position of the job in the submitted list
  pub index: usize,
  /// Partition the job was labeled with, if any
  pub label: Option<String>,
  /// What went wrong
  pub error: Error,
}

impl fmt::Display for JobFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.label {
      | Some(label) => write!(f, "[{}] {}: {}", self.index, label, self.error),
      | None => write!(f, "[{}] {}", self.index, self.error),
    }
  }
}

/// Every job error of a finished pool, in job order
#[derive(Clone, Debug)]
pub struct AggregateError {
  failures: Vec<JobFailure>,
  total: usize,
}

impl AggregateError {
  pub(super) fn new(failures: Vec<JobFailure>, total: usize) -> Self {
    Self { failures, total }
  }

  /// The individual failures
  pub fn failures(&self) -> &[JobFailure] {
    &self.failures
  }

  /// Number of failed jobs
  pub fn len(&self) -> usize {
    self.failures.len()
  }

  /// Never true for an aggregate handed out by a pool
  pub fn is_empty(&self) -> bool {
    self.failures.is_empty()
  }

  /// Number of jobs the pool ran, failed or not
  pub fn total(&self) -> usize {
    self.total
  }
}

impl fmt::Display for AggregateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} of {} jobs failed", self.failures.len(), self.total)?;

    for failure in &self.failures {
      write!(f, "\n  {}", failure)?;
    }

    Ok(())
  }
}

impl std::error::Error for AggregateError {}
