use std::sync::{Mutex, PoisonError};

use super::job::{Job, Limits};

/// Worker thread logic.
///
/// Each item handed out by `queue` is a distinct job, so the job itself
/// needs no lock; only the queue cursor is shared. Jobs catch their own
/// panics outside the lock, so a poisoned cursor is still consistent.
pub(super) fn drain<'a, T, I>(queue: &Mutex<I>, limits: &Limits, run_id: &str, worker: usize)
  where T: 'a,
        I: Iterator<Item = (usize, &'a mut Job<T>)>
{
  log::debug!("pool {}: worker {} up", run_id, worker);

  let mut picked = 0usize;

  loop {
    // the guard is dropped at the end of this statement, before the job runs
    let next = queue.lock().unwrap_or_else(PoisonError::into_inner).next();

    match next {
      | Some((ix, job)) => {
        picked += 1;
        job.execute(ix, limits, run_id);
      },
      | None => break,
    }
  }

  log::debug!("pool {}: worker {} done after {} jobs", run_id, worker, picked);
}
