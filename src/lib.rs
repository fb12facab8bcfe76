//! # regionpool
//! Fan cloud inventory calls out across regions with a fixed concurrency ceiling,
//! without one failing region sinking the others.
//!
//! # Flow
//! - a service query lists the regions it should look in ([`region::Source`])
//! - it builds one [`pool::Job`] per region ([`fanout::per_partition`]);
//!   if the regions can't be listed, it gets a single job that already failed
//! - each job's work calls the API and runs errors through a [`soft::Policy`],
//!   so "access denied in this region" becomes an empty [`pool::Outcome::SoftSkip`]
//! - the [`pool::Pool`] runs at most N jobs at once and blocks until all are done
//! - the caller checks [`pool::Finished::has_errors`], then flattens results in job order
//!
//! The `regionpool_bin` binary does this with an HTTP probe per region ([`probe`])
//! and prints a json [`report::Report`].

#![deny(missing_docs)]
#![cfg_attr(not(test), deny(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]

/// Bounded job dispatcher
pub mod pool;

/// Fan-out calling convention
pub mod fanout;

/// Soft failure classification
pub mod soft;

/// Regions to fan out over
pub mod region;

/// Per-region HTTP probe
pub mod probe;

/// Json report of a probe run
pub mod report;

/// App environment
pub mod config;

lazy_static::lazy_static! {
  /// HTTP request client shared by every job
  pub static ref CLIENT: reqwest::blocking::Client = reqwest::blocking::Client::new();
}
