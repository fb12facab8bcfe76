//! Bounded job dispatcher.
//!
//! A [`Pool`] takes a list of [`Job`]s and a concurrency limit, runs every
//! job on at most that many worker threads, and blocks until all of them are
//! done. One job failing never stops the others; afterwards the caller gets a
//! [`Finished`] pool to inspect, with jobs in the order they were submitted.
//!
//! ```
//! use regionpool::pool::{Job, Outcome, Pool};
//!
//! let jobs = vec!["us-east-1", "eu-west-1"].into_iter()
//!                                          .map(|r| Job::labeled(r, move |_| Outcome::Success(vec![r.len()])))
//!                                          .collect();
//!
//! let done = Pool::new(jobs, 5).unwrap().run();
//!
//! assert!(!done.has_errors());
//! assert_eq!(done.flatten().unwrap(), vec![9, 9]);
//! ```

use std::{sync::Mutex,
          thread,
          time::{Duration, Instant}};

use tokio_util::sync::CancellationToken;

mod error;
mod job;
mod worker;

pub use error::*;
pub use job::{Ctx, Job, Status, Work};

/// What a job's work decided about its partition
#[derive(Debug)]
pub enum Outcome<T> {
  /// The partition was checked and this is what it holds
  Success(T),
  /// The partition could not be checked, but that is not an error (e.g. access denied in that region).
  ///
  /// Kept apart from `Success` so "nothing there" and "couldn't look" stay distinguishable.
  SoftSkip(T),
  /// The partition could not be checked
  Fail(Error),
}

impl<T, E> From<Result<T, E>> for Outcome<T> where E: Into<BoxError>
{
  fn from(res: Result<T, E>) -> Self {
    match res {
      | Ok(t) => Outcome::Success(t),
      | Err(e) => Outcome::Fail(Error::work(e)),
    }
  }
}

/// Jobs waiting to be run with bounded concurrency
#[derive(Debug)]
pub struct Pool<T> {
  id: String,
  jobs: Vec<Job<T>>,
  concurrency: usize,
  cancel: Option<CancellationToken>,
  deadline: Option<Instant>,
  timeout: Option<Duration>,
}

impl<T: Send> Pool<T> {
  /// Create a pool that will run at most `concurrency` jobs at once
  pub fn new(jobs: Vec<Job<T>>, concurrency: usize) -> Result<Self, BuildError> {
    if concurrency == 0 {
      return Err(BuildError::ZeroConcurrency);
    }

    Ok(Self { id: nanoid::nanoid!(8),
              jobs,
              concurrency,
              cancel: None,
              deadline: None,
              timeout: None })
  }

  /// Stop starting new jobs once `token` is cancelled.
  ///
  /// Jobs that have not started by then end as [`Error::Cancelled`].
  /// Running jobs are not interrupted but can check [`Ctx::is_cancelled`].
  pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
    self.cancel = Some(token);
    self
  }

  /// Stop starting new jobs at `deadline`.
  ///
  /// Jobs that have not started by then end as [`Error::DeadlineExceeded`].
  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  /// Like [`Pool::with_deadline`], measured from when [`Pool::run`] is called
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Short id for this run, used in logs and thread names
  pub fn id(&self) -> &str {
    &self.id
  }

  /// The concurrency limit
  pub fn concurrency(&self) -> usize {
    self.concurrency
  }

  /// Jobs queued in this pool
  pub fn jobs(&self) -> &[Job<T>] {
    &self.jobs
  }

  /// Run every job and block until all are done
  pub fn run(self) -> Finished<T> {
    let Pool { id,
               mut jobs,
               concurrency,
               cancel,
               deadline,
               timeout, } = self;

    let started = Instant::now();
    let deadline = match (deadline, timeout.map(|t| started + t)) {
      | (Some(a), Some(b)) => Some(a.min(b)),
      | (a, b) => a.or(b),
    };
    let limits = job::Limits { cancel, deadline };

    let workers = concurrency.min(jobs.len());
    log::info!("pool {}: running {} jobs on {} workers", id, jobs.len(), workers);

    if workers > 0 {
      let queue = Mutex::new(jobs.iter_mut().enumerate());

      thread::scope(|s| {
        let (queue, limits, id) = (&queue, &limits, id.as_str());
        let mut spawned = 0usize;

        for n in 0..workers {
          let spawn = thread::Builder::new().name(format!("pool-{}-{}", id, n))
                                            .spawn_scoped(s, move || worker::drain(queue, limits, id, n));

          match spawn {
            | Ok(_) => spawned += 1,
            | Err(e) => log::warn!("pool {}: could not spawn worker {}: {}", id, n, e),
          }
        }

        if spawned == 0 {
          log::warn!("pool {}: no workers could be spawned, running jobs inline", id);
          worker::drain(queue, limits, id, 0);
        }
      });
    }

    let finished = Finished { id,
                              jobs,
                              elapsed: started.elapsed() };

    log::info!("pool {}: {} jobs done in {}ms, {} failed",
               finished.id,
               finished.jobs.len(),
               finished.elapsed.as_millis(),
               finished.jobs.iter().filter(|j| j.err().is_some()).count());

    finished
  }
}

/// A pool that has run.
///
/// Jobs are in the order they were submitted, whatever order they finished in.
#[derive(Debug)]
pub struct Finished<T> {
  id: String,
  jobs: Vec<Job<T>>,
  elapsed: Duration,
}

impl<T> Finished<T> {
  /// Id of the run
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Wall-clock time the run took
  pub fn elapsed(&self) -> Duration {
    self.elapsed
  }

  /// Jobs, in submission order
  pub fn jobs(&self) -> &[Job<T>] {
    &self.jobs
  }

  /// Take the jobs, in submission order
  pub fn into_jobs(self) -> Vec<Job<T>> {
    self.jobs
  }

  /// Whether any job carries an error
  pub fn has_errors(&self) -> bool {
    self.jobs.iter().any(|j| j.err().is_some())
  }

  /// Every job error, or `None` if there are none
  pub fn errors(&self) -> Option<AggregateError> {
    let failures = self.jobs
                       .iter()
                       .enumerate()
                       .filter_map(|(index, job)| {
                         job.err().map(|error| JobFailure { index,
                                                             label: job.label().map(String::from),
                                                             error: error.clone() })
                       })
                       .collect::<Vec<_>>();

    match failures.is_empty() {
      | true => None,
      | false => Some(AggregateError::new(failures, self.jobs.len())),
    }
  }

  /// Every job's result in job order, or every error if any job failed
  pub fn into_results(self) -> Result<Vec<T>, AggregateError> {
    if let Some(errs) = self.errors() {
      return Err(errs);
    }

    Ok(self.jobs.into_iter().filter_map(|j| ok_value(j.into_status())).collect())
  }

  /// Results of the jobs that did not fail, alongside the errors of those that did.
  ///
  /// For callers that are fine reporting on the partitions they could reach.
  pub fn partial(self) -> (Vec<T>, Option<AggregateError>) {
    let errs = self.errors();
    let results = self.jobs.into_iter().filter_map(|j| ok_value(j.into_status())).collect();

    (results, errs)
  }
}

impl<T: IntoIterator> Finished<T> {
  /// Concatenate every job's result in job order, or every error if any job failed
  pub fn flatten(self) -> Result<Vec<T::Item>, AggregateError> {
    self.into_results().map(|rs| rs.into_iter().flatten().collect())
  }
}

fn ok_value<T>(status: Status<T>) -> Option<T> {
  match status {
    | Status::Succeeded(t) | Status::SoftSkipped(t) => Some(t),
    | _ => None,
  }
}
