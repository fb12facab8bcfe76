use std::{convert::TryFrom, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize as De, Serialize as Ser};

use crate::{pool::{Finished, Status},
            probe::Probe};

/// How one region fared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Ser, De)]
#[serde(rename_all = "snake_case")]
pub enum State {
  /// Endpoint answered
  Ok,
  /// Endpoint could not be accessed, but that's expected (e.g. access denied)
  SoftSkipped,
  /// Endpoint could not be accessed
  Failed,
  /// Never probed, the region list itself could not be read
  Skipped,
}

/// One line of a report
#[derive(Clone, Debug, PartialEq, Eq, Ser, De)]
pub struct Entry {
  /// Region this entry is about, absent for a failed region listing
  pub region: Option<String>,
  /// Outcome
  pub state: State,
  /// HTTP status, if the endpoint answered
  pub status: Option<u16>,
  /// Round trip time, if the endpoint answered
  pub elapsed_ms: Option<u64>,
  /// What went wrong
  pub error: Option<String>,
}

/// Summary of a probe run, serialized by the binary
#[derive(Clone, Debug, PartialEq, Eq, Ser, De)]
pub struct Report {
  /// Pool run id
  pub run_id: String,
  /// When the run started
  pub started_at: DateTime<Utc>,
  /// How long the run took
  pub elapsed_ms: u64,
  /// Whether any region failed
  pub has_errors: bool,
  /// One entry per job, in job order
  pub regions: Vec<Entry>,
}

impl Report {
  /// Summarize a finished probe run
  pub fn new(finished: &Finished<Vec<Probe>>, started_at: DateTime<Utc>) -> Self {
    let regions = finished.jobs()
                          .iter()
                          .map(|job| {
                            let region = job.label().map(String::from);
                            let probe = job.result().and_then(|ps| ps.first());
                            let (state, error) = match job.status() {
                              | Status::Succeeded(_) => (State::Ok, None),
                              | Status::SoftSkipped(_) => (State::SoftSkipped, None),
                              | Status::Skipped(e) => (State::Skipped, Some(e.to_string())),
                              | Status::Failed(e) => (State::Failed, Some(e.to_string())),
                              | Status::Pending => (State::Failed, Some("never ran".to_string())),
                            };

                            Entry { region,
                                    state,
                                    status: probe.map(|p| p.status),
                                    elapsed_ms: probe.map(|p| p.elapsed_ms),
                                    error }
                          })
                          .collect();

    Self { run_id: finished.id().to_string(),
           started_at,
           elapsed_ms: millis(finished.elapsed()),
           has_errors: finished.has_errors(),
           regions }
  }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`
pub(crate) fn millis(d: Duration) -> u64 {
  u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
