use std::{panic::{self, AssertUnwindSafe},
          time::{Duration, Instant}};

use tokio_util::sync::CancellationToken;

use super::{error::{BoxError, Error},
            Outcome};

/// Deferred work owned by a [`Job`]
pub type Work<T> = Box<dyn FnOnce(Ctx) -> Outcome<T> + Send + 'static>;

/// Cancellation and deadline shared by every worker of one run
#[derive(Clone, Debug, Default)]
pub(super) struct Limits {
  pub(super) cancel: Option<CancellationToken>,
  pub(super) deadline: Option<Instant>,
}

impl Limits {
  fn is_cancelled(&self) -> bool {
    self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
  }

  fn is_expired(&self) -> bool {
    self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
  }
}

/// What a job's work gets to see about the run it is part of
#[derive(Clone, Debug)]
pub struct Ctx {
  index: usize,
  label: Option<String>,
  limits: Limits,
}

impl Ctx {
  /// Position of this job in the submitted list
  pub fn index(&self) -> usize {
    self.index
  }

  /// Partition this job was labeled with
  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }

  /// Whether the pool was asked to stop.
  ///
  /// Long-running work (e.g. paginating) should check this between pages.
  pub fn is_cancelled(&self) -> bool {
    self.limits.is_cancelled()
  }

  /// Time left until the pool's deadline, `None` if it has no deadline
  pub fn remaining(&self) -> Option<Duration> {
    self.limits
        .deadline
        .map(|d| d.saturating_duration_since(Instant::now()))
  }
}

/// Where a job is in its lifecycle.
///
/// `Pending` is the only non-terminal state observable from outside a run.
#[derive(Debug)]
pub enum Status<T> {
  /// Not run yet
  Pending,
  /// Built with an error already set, never run
  Skipped(Error),
  /// Work returned a result
  Succeeded(T),
  /// Work hit a soft failure and returned a placeholder result
  SoftSkipped(T),
  /// Work failed or panicked, or the run was cancelled / out of time before it started
  Failed(Error),
}

impl<T> From<Outcome<T>> for Status<T> {
  fn from(outcome: Outcome<T>) -> Self {
    match outcome {
      | Outcome::Success(t) => Status::Succeeded(t),
      | Outcome::SoftSkip(t) => Status::SoftSkipped(t),
      | Outcome::Fail(e) => Status::Failed(e),
    }
  }
}

/// One independently executable unit of work
pub struct Job<T> {
  label: Option<String>,
  work: Option<Work<T>>,
  status: Status<T>,
}

impl<T> std::fmt::Debug for Job<T> where T: std::fmt::Debug
{
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Job")
     .field("label", &self.label)
     .field("work", &self.work.as_ref().map(|_| "FnOnce(Ctx) -> Outcome"))
     .field("status", &self.status)
     .finish()
  }
}

impl<T> Job<T> {
  /// A job that runs `work`
  pub fn new(work: impl FnOnce(Ctx) -> Outcome<T> + Send + 'static) -> Self {
    Self { label: None,
           work: Some(Box::new(work)),
           status: Status::Pending }
  }

  /// A job that runs fallible `work`, any error being a hard failure
  pub fn try_new<E>(work: impl FnOnce(Ctx) -> Result<T, E> + Send + 'static) -> Self
    where E: Into<BoxError>
  {
    Self::new(move |ctx| Outcome::from(work(ctx)))
  }

  /// A job for partition `label` (usually a region) that runs `work`
  pub fn labeled(label: impl ToString, work: impl FnOnce(Ctx) -> Outcome<T> + Send + 'static) -> Self {
    Self::new(work).with_label(label)
  }

  /// A job that already failed and will never run.
  ///
  /// Used when the caller could not even work out what to fan out over.
  pub fn failed(error: Error) -> Self {
    Self { label: None,
           work: None,
           status: Status::Skipped(error) }
  }

  /// Set the partition label used in logs and aggregated errors
  pub fn with_label(mut self, label: impl ToString) -> Self {
    self.label = Some(label.to_string());
    self
  }

  /// Partition label
  pub fn label(&self) -> Option<&str> {
    self.label.as_deref()
  }

  /// Current state of the job
  pub fn status(&self) -> &Status<T> {
    &self.status
  }

  /// Consume the job, yielding its state
  pub fn into_status(self) -> Status<T> {
    self.status
  }

  /// The job's result, soft skips included
  pub fn result(&self) -> Option<&T> {
    match &self.status {
      | Status::Succeeded(t) | Status::SoftSkipped(t) => Some(t),
      | _ => None,
    }
  }

  /// The job's error, preset or not
  pub fn err(&self) -> Option<&Error> {
    match &self.status {
      | Status::Skipped(e) | Status::Failed(e) => Some(e),
      | _ => None,
    }
  }

  /// Whether the job's result is a placeholder for a partition that could not be checked
  pub fn is_soft_skipped(&self) -> bool {
    matches!(self.status, Status::SoftSkipped(_))
  }

  /// Whether the job has not run yet
  pub fn is_pending(&self) -> bool {
    matches!(self.status, Status::Pending)
  }

  /// Run the job's work (at most once) and record what happened.
  ///
  /// A job that already carries an error is left alone.
  pub(super) fn execute(&mut self, index: usize, limits: &Limits, run_id: &str) {
    let work = match (&self.status, self.work.take()) {
      | (Status::Pending, Some(work)) => work,
      | _ => {
        log::debug!("pool {}: job {} carries a preset error, skipping", run_id, index);
        return;
      },
    };

    if limits.is_cancelled() {
      log::debug!("pool {}: job {} cancelled before starting", run_id, index);
      self.status = Status::Failed(Error::Cancelled);
      return;
    }

    if limits.is_expired() {
      log::debug!("pool {}: job {} past deadline before starting", run_id, index);
      self.status = Status::Failed(Error::DeadlineExceeded);
      return;
    }

    let ctx = Ctx { index,
                    label: self.label.clone(),
                    limits: limits.clone() };

    log::debug!("pool {}: job {} ({}) working",
                run_id,
                index,
                self.label.as_deref().unwrap_or("-"));

    let outcome = panic::catch_unwind(AssertUnwindSafe(move || work(ctx))).unwrap_or_else(|payload| {
                    let msg = panic_message(payload.as_ref());
                    log::error!("pool {}: job {} panicked: {}", run_id, index, msg);
                    Outcome::Fail(Error::Panicked(msg))
                  });

    if let Outcome::Fail(e) = &outcome {
      log::debug!("pool {}: job {} failed: {}", run_id, index, e);
    }

    self.status = outcome.into();
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  payload.downcast_ref::<&str>()
         .map(|s| s.to_string())
         .or_else(|| payload.downcast_ref::<String>().cloned())
         .unwrap_or_else(|| "unknown panic payload".into())
}
