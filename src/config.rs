use std::{env, path::PathBuf, time::Duration};

use crate::region::{self, Region, Source};

/// Concurrency used across every service module
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Regional endpoint probed when none is configured
pub const DEFAULT_ENDPOINT: &str = "https://ec2.{region}.amazonaws.com/";

/// Errors encounterable reading configuration
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
  /// A variable that must be a positive integer wasn't
  #[error("{var} must be a positive integer, got {value:?}")]
  NotPositive {
    /// Variable name
    var: &'static str,
    /// What it was set to
    value: String,
  },
  /// The endpoint template has nowhere to put the region
  #[error("{var} must contain \"{{region}}\", got {value:?}")]
  NoRegionPlaceholder {
    /// Variable name
    var: &'static str,
    /// What it was set to
    value: String,
  },
}

/// Where the regions come from.
///
/// Parsing and reading happen when the regions are listed, so a bad list
/// surfaces as a failed job rather than a startup error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Regions {
  /// [`region::DEFAULT_REGIONS`]
  Default,
  /// `REGIONPOOL_REGIONS`
  Listed(region::Listed),
  /// `REGIONPOOL_REGIONS_FILE`
  File(region::JsonFile),
}

impl Source for Regions {
  fn regions(&self) -> Result<Vec<Region>, region::Error> {
    match self {
      | Regions::Default => region::Static::defaults().regions(),
      | Regions::Listed(l) => l.regions(),
      | Regions::File(f) => f.regions(),
    }
  }
}

/// App environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
  /// Most jobs running at once (`REGIONPOOL_CONCURRENCY`)
  pub concurrency: usize,
  /// Regions to fan out over
  pub regions: Regions,
  /// Endpoint template, containing `{region}` (`REGIONPOOL_ENDPOINT`)
  pub endpoint: String,
  /// Stop starting jobs after this long (`REGIONPOOL_TIMEOUT_SECS`)
  pub timeout: Option<Duration>,
}

impl Default for Config {
  fn default() -> Self {
    Self { concurrency: DEFAULT_CONCURRENCY,
           regions: Regions::Default,
           endpoint: DEFAULT_ENDPOINT.to_string(),
           timeout: None }
  }
}

impl Config {
  /// Read configuration from the process environment, loading `./.env` first if present
  pub fn from_env() -> Result<Self, Error> {
    dotenv::dotenv().ok();
    Self::from_vars(|var| env::var(var).ok())
  }

  /// Read configuration from `get`, which looks up a variable by name
  pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
    let lookup = |var: &str| get(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let concurrency = lookup("REGIONPOOL_CONCURRENCY").map(|v| positive("REGIONPOOL_CONCURRENCY", v))
                                                      .transpose()?
                                                      .unwrap_or(DEFAULT_CONCURRENCY);

    let timeout = lookup("REGIONPOOL_TIMEOUT_SECS").map(|v| positive("REGIONPOOL_TIMEOUT_SECS", v))
                                                   .transpose()?
                                                   .map(|secs| Duration::from_secs(secs as u64));

    let endpoint = match lookup("REGIONPOOL_ENDPOINT") {
      | Some(e) if !e.contains("{region}") => {
        return Err(Error::NoRegionPlaceholder { var: "REGIONPOOL_ENDPOINT",
                                                value: e })
      },
      | Some(e) => e,
      | None => DEFAULT_ENDPOINT.to_string(),
    };

    let regions = match (lookup("REGIONPOOL_REGIONS_FILE"), lookup("REGIONPOOL_REGIONS")) {
      | (Some(path), _) => Regions::File(region::JsonFile(PathBuf::from(path))),
      | (None, Some(list)) => Regions::Listed(region::Listed(list)),
      | (None, None) => Regions::Default,
    };

    Ok(Self { concurrency,
              regions,
              endpoint,
              timeout })
  }
}

fn positive(var: &'static str, value: String) -> Result<usize, Error> {
  match value.parse::<usize>() {
    | Ok(n) if n > 0 => Ok(n),
    | _ => Err(Error::NotPositive { var, value }),
  }
}
