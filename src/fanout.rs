//! The calling convention around [`Pool`]: one job per partition, run, then
//! either fail with every partition's error or flatten results in job order.

use std::fmt::Display;

use crate::pool::{AggregateError, BoxError, BuildError, Ctx, Error, Finished, Job, Outcome, Pool};

/// Errors a fanned out query can end with
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
  /// The pool could not be built
  #[error(transparent)]
  Build(#[from] BuildError),
  /// At least one partition failed
  #[error(transparent)]
  Jobs(#[from] AggregateError),
}

/// Build one labeled job per partition listed by `enumerate`.
///
/// When `enumerate` fails there is nothing to fan out over, so the result is a
/// single job that already carries the failure and will never run.
pub fn per_partition<P, T, E, W>(enumerate: impl FnOnce() -> Result<Vec<P>, E>,
                                 mut make_work: impl FnMut(P) -> W)
                                 -> Vec<Job<T>>
  where P: Display,
        E: Into<BoxError>,
        W: FnOnce(Ctx) -> Outcome<T> + Send + 'static
{
  match enumerate() {
    | Ok(partitions) => partitions.into_iter()
                                  .map(|p| {
                                    let label = p.to_string();
                                    Job::labeled(label, make_work(p))
                                  })
                                  .collect(),
    | Err(e) => {
      let error = Error::enumeration(e);
      log::warn!("{}", error);
      vec![Job::failed(error)]
    },
  }
}

/// Run `jobs` with at most `concurrency` at once, blocking until all are done
pub fn run<T: Send>(jobs: Vec<Job<T>>, concurrency: usize) -> Result<Finished<T>, BuildError> {
  Pool::new(jobs, concurrency).map(Pool::run)
}

/// Fail with every job's error if any job failed, otherwise concatenate
/// each job's results in job order
pub fn collect<T: IntoIterator>(finished: Finished<T>) -> Result<Vec<T::Item>, AggregateError> {
  if let Some(errs) = finished.errors() {
    log::error!("{}", errs);
    return Err(errs);
  }

  finished.flatten()
}

/// [`run`] then [`collect`]
pub fn query<T>(jobs: Vec<Job<T>>, concurrency: usize) -> Result<Vec<T::Item>, QueryError>
  where T: IntoIterator + Send
{
  let finished = run(jobs, concurrency)?;
  collect(finished).map_err(QueryError::from)
}
