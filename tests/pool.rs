use std::{sync::{atomic::{AtomicUsize, Ordering},
                 Arc},
          thread,
          time::{Duration, Instant}};

use regionpool::pool::{BuildError, Error, Job, Outcome, Pool, Status};
use tokio_util::sync::CancellationToken;

fn init() {
  simple_logger::SimpleLogger::new().init().ok();
}

/// Counts how many works are running right now, and the most ever seen at once
#[derive(Default)]
struct Gauge {
  running: AtomicUsize,
  max: AtomicUsize,
  calls: AtomicUsize,
}

impl Gauge {
  fn enter(&self) {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.max.fetch_max(now, Ordering::SeqCst);
  }

  fn exit(&self) {
    self.running.fetch_sub(1, Ordering::SeqCst);
  }

  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  fn max(&self) -> usize {
    self.max.load(Ordering::SeqCst)
  }
}

fn sleepy_job(gauge: &Arc<Gauge>, sleep_ms: u64, value: &'static str) -> Job<Vec<&'static str>> {
  let gauge = Arc::clone(gauge);
  Job::labeled(value, move |_| {
    gauge.enter();
    thread::sleep(Duration::from_millis(sleep_ms));
    gauge.exit();
    Outcome::Success(vec![value])
  })
}

#[test]
fn all_succeed_in_submission_order() {
  init();
  let gauge = Arc::new(Gauge::default());

  // earlier jobs sleep longer, so they finish last
  let jobs = vec![sleepy_job(&gauge, 50, "a"),
                  sleepy_job(&gauge, 40, "b"),
                  sleepy_job(&gauge, 30, "c"),
                  sleepy_job(&gauge, 20, "d"),
                  sleepy_job(&gauge, 10, "e")];

  let done = Pool::new(jobs, 5).unwrap().run();

  assert!(!done.has_errors());
  assert!(done.errors().is_none());
  assert_eq!(done.jobs()
                 .iter()
                 .map(|j| j.label().unwrap())
                 .collect::<Vec<_>>(),
             vec!["a", "b", "c", "d", "e"]);
  assert_eq!(done.flatten().unwrap(), vec!["a", "b", "c", "d", "e"]);
  assert_eq!(gauge.calls(), 5);
}

#[test]
fn one_failure_does_not_stop_the_others() {
  init();
  let ran = Arc::new(AtomicUsize::new(0));

  let jobs = (0..5).map(|i| {
                     let ran = Arc::clone(&ran);
                     Job::labeled(format!("region-{}", i), move |_| {
                       ran.fetch_add(1, Ordering::SeqCst);
                       thread::sleep(Duration::from_millis(5));
                       match i {
                         | 2 => Outcome::Fail(Error::work("access denied")),
                         | _ => Outcome::Success(vec![i]),
                       }
                     })
                   })
                   .collect();

  let done = Pool::new(jobs, 2).unwrap().run();

  assert_eq!(ran.load(Ordering::SeqCst), 5);
  assert!(done.has_errors());

  let errs = done.errors().unwrap();
  assert_eq!(errs.len(), 1);
  assert_eq!(errs.total(), 5);
  assert_eq!(errs.failures()[0].index, 2);
  assert_eq!(errs.failures()[0].label.as_deref(), Some("region-2"));
  assert!(errs.to_string().contains("region-2: access denied"));

  for (ix, job) in done.jobs().iter().enumerate() {
    match ix {
      | 2 => assert!(job.result().is_none()),
      | _ => assert_eq!(job.result(), Some(&vec![ix])),
    }
  }

  assert!(done.flatten().is_err());
}

#[test]
fn every_failure_is_aggregated() {
  init();

  let jobs = (0..10).map(|i| {
                      Job::labeled(format!("p{}", i), move |_| match i % 2 {
                        | 0 => Outcome::Fail(Error::work(format!("boom {}", i))),
                        | _ => Outcome::Success(i),
                      })
                    })
                    .collect();

  let done = Pool::new(jobs, 3).unwrap().run();
  let errs = done.errors().unwrap();

  assert_eq!(errs.len(), 5);
  assert_eq!(errs.failures().iter().map(|f| f.index).collect::<Vec<_>>(),
             vec![0, 2, 4, 6, 8]);

  let msg = errs.to_string();
  assert!(msg.starts_with("5 of 10 jobs failed"));
  for i in (0..10).step_by(2) {
    assert!(msg.contains(&format!("p{}: boom {}", i, i)), "{}", msg);
  }

  let (ok, errs) = done.partial();
  assert_eq!(ok, vec![1, 3, 5, 7, 9]);
  assert_eq!(errs.map(|e| e.len()), Some(5));
}

#[test]
fn pre_failed_job_is_never_run() {
  init();

  let jobs: Vec<Job<Vec<u8>>> = vec![Job::failed(Error::enumeration("could not list regions"))];
  let done = Pool::new(jobs, 5).unwrap().run();

  assert!(done.has_errors());
  assert!(matches!(done.jobs()[0].status(), Status::Skipped(Error::Enumeration(_))));

  let errs = done.errors().unwrap();
  assert_eq!(errs.len(), 1);
  assert!(errs.to_string()
              .contains("could not enumerate partitions: could not list regions"));
}

#[test]
fn pre_failed_job_among_others() {
  init();
  let ran = Arc::new(AtomicUsize::new(0));
  let counted = |ran: &Arc<AtomicUsize>| {
    let ran = Arc::clone(ran);
    Job::new(move |_| {
      ran.fetch_add(1, Ordering::SeqCst);
      Outcome::Success(1)
    })
  };

  let jobs = vec![counted(&ran), Job::failed(Error::work("preset")), counted(&ran)];
  let done = Pool::new(jobs, 2).unwrap().run();

  assert_eq!(ran.load(Ordering::SeqCst), 2);
  assert_eq!(done.errors().unwrap().failures()[0].index, 1);
}

#[test]
fn no_jobs() {
  init();

  let started = Instant::now();
  let done = Pool::<Vec<u8>>::new(vec![], 5).unwrap().run();

  assert!(started.elapsed() < Duration::from_secs(1));
  assert!(!done.has_errors());
  assert!(done.flatten().unwrap().is_empty());
}

#[test]
fn zero_concurrency_is_rejected() {
  let err = Pool::<u8>::new(vec![Job::new(|_| Outcome::Success(1))], 0).unwrap_err();

  assert_eq!(err, BuildError::ZeroConcurrency);
}

#[test]
fn never_more_than_limit_at_once() {
  init();
  let gauge = Arc::new(Gauge::default());

  let jobs = (0..20).map(|_| sleepy_job(&gauge, 10, "x")).collect();
  let done = Pool::new(jobs, 3).unwrap().run();

  assert!(!done.has_errors());
  assert_eq!(gauge.calls(), 20);
  assert!(gauge.max() <= 3, "saw {} jobs at once", gauge.max());
}

#[test]
fn limit_of_one_runs_serially() {
  init();
  let gauge = Arc::new(Gauge::default());

  let jobs = (0..10).map(|_| sleepy_job(&gauge, 10, "x")).collect();

  let started = Instant::now();
  let done = Pool::new(jobs, 1).unwrap().run();

  assert!(started.elapsed() >= Duration::from_millis(100));
  assert_eq!(gauge.max(), 1);
  assert_eq!(done.flatten().unwrap().len(), 10);
}

#[test]
fn limit_above_job_count() {
  init();
  let gauge = Arc::new(Gauge::default());

  let jobs = (0..2).map(|_| sleepy_job(&gauge, 5, "x")).collect();
  let done = Pool::new(jobs, 50).unwrap().run();

  assert_eq!(done.flatten().unwrap(), vec!["x", "x"]);
  assert!(gauge.max() <= 2);
}

#[test]
fn panicking_job_is_recorded() {
  init();

  let jobs = (0..4).map(|i| {
                     Job::new(move |_| {
                       if i == 1 {
                         panic!("boom");
                       }
                       Outcome::Success(i)
                     })
                   })
                   .collect();

  let done = Pool::new(jobs, 2).unwrap().run();

  match done.jobs()[1].err() {
    | Some(Error::Panicked(msg)) => assert_eq!(msg, "boom"),
    | other => panic!("expected panic error, got {:?}", other),
  }

  let (ok, errs) = done.partial();
  assert_eq!(ok, vec![0, 2, 3]);
  assert_eq!(errs.unwrap().len(), 1);
}

#[test]
fn soft_skip_is_not_an_error() {
  init();

  let jobs = vec![Job::labeled("us-east-1", |_| Outcome::Success(vec![1, 2])),
                  Job::labeled("me-south-1", |_| Outcome::SoftSkip(vec![])),
                  Job::labeled("eu-west-1", |_| Outcome::Success(vec![3]))];

  let done = Pool::new(jobs, 2).unwrap().run();

  assert!(!done.has_errors());
  assert!(done.jobs()[1].is_soft_skipped());
  assert!(!done.jobs()[0].is_soft_skipped());
  assert_eq!(done.flatten().unwrap(), vec![1, 2, 3]);
}

#[test]
fn fallible_work() {
  init();

  let jobs = vec![Job::try_new(|_| Ok::<_, std::io::Error>(1)),
                  Job::try_new(|_| Err(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire")))];

  let done = Pool::new(jobs, 2).unwrap().run();

  assert_eq!(done.jobs()[0].result(), Some(&1));
  assert!(done.into_results()
              .unwrap_err()
              .to_string()
              .contains("[1] disk on fire"));
}

#[test]
fn ctx_knows_its_job() {
  init();

  let jobs = vec!["a", "b", "c"].into_iter()
                                .map(|l| {
                                  Job::labeled(l, |ctx| {
                                    Outcome::Success(vec![(ctx.index(), ctx.label().unwrap().to_string())])
                                  })
                                })
                                .collect();

  let done = Pool::new(jobs, 2).unwrap().run();

  assert_eq!(done.flatten().unwrap(),
             vec![(0, "a".to_string()), (1, "b".to_string()), (2, "c".to_string())]);
}

#[test]
fn cancelled_before_run() {
  init();
  let ran = Arc::new(AtomicUsize::new(0));
  let token = CancellationToken::new();
  token.cancel();

  let jobs = (0..5).map(|_| {
                     let ran = Arc::clone(&ran);
                     Job::new(move |_| {
                       ran.fetch_add(1, Ordering::SeqCst);
                       Outcome::Success(())
                     })
                   })
                   .collect();

  let done = Pool::new(jobs, 2).unwrap().with_cancellation(token).run();

  assert_eq!(ran.load(Ordering::SeqCst), 0);
  assert_eq!(done.errors().unwrap().len(), 5);
  assert!(done.jobs()
              .iter()
              .all(|j| matches!(j.err(), Some(Error::Cancelled))));
}

#[test]
fn cancelled_mid_run() {
  init();
  let token = CancellationToken::new();

  let first = {
    let token = token.clone();
    Job::new(move |ctx| {
      token.cancel();
      assert!(ctx.is_cancelled());
      Outcome::Success(0)
    })
  };

  let mut jobs = vec![first];
  jobs.extend((1..4).map(|i| Job::new(move |_| Outcome::Success(i))));

  // one worker, so job 0 finishes before any other starts
  let done = Pool::new(jobs, 1).unwrap().with_cancellation(token).run();

  assert_eq!(done.jobs()[0].result(), Some(&0));
  assert!(done.jobs()[1..].iter()
                          .all(|j| matches!(j.err(), Some(Error::Cancelled))));
}

#[test]
fn jobs_not_started_by_deadline() {
  init();

  let jobs = (0..3).map(|i| Job::new(move |_| Outcome::Success(i))).collect();
  let done = Pool::new(jobs, 3).unwrap()
                               .with_timeout(Duration::from_millis(0))
                               .run();

  assert!(done.jobs()
              .iter()
              .all(|j| matches!(j.err(), Some(Error::DeadlineExceeded))));
}

#[test]
fn deadline_is_visible_to_work() {
  init();

  let jobs = vec![Job::new(|ctx| Outcome::Success(ctx.remaining())),
                  Job::new(|ctx| Outcome::Success(ctx.remaining()))];

  let done = Pool::new(jobs, 1).unwrap()
                               .with_timeout(Duration::from_secs(60))
                               .run();

  for job in done.jobs() {
    let remaining = job.result().unwrap().unwrap();
    assert!(remaining > Duration::from_secs(50));
  }

  let unbounded = Pool::new(vec![Job::new(|ctx| Outcome::Success(ctx.remaining()))], 1).unwrap()
                                                                                       .run();
  assert_eq!(unbounded.jobs()[0].result(), Some(&None));
}

#[test]
fn pool_reports_its_setup() {
  let jobs = (0..3).map(|i| Job::new(move |_| Outcome::Success(i))).collect();
  let pool = Pool::new(jobs, 4).unwrap();

  assert_eq!(pool.concurrency(), 4);
  assert_eq!(pool.jobs().len(), 3);
  assert!(pool.jobs().iter().all(|j| j.is_pending()));
  assert_eq!(pool.id().len(), 8);

  let id = pool.id().to_string();
  assert_eq!(pool.run().id(), id);
}
