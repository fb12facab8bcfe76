use std::{fmt,
          path::PathBuf,
          str::FromStr};

use serde::{Deserialize as De, Serialize as Ser};

/// Commercial AWS regions, used when nothing else is configured
pub const DEFAULT_REGIONS: &[&str] = &["us-east-1",
                                       "us-east-2",
                                       "us-west-1",
                                       "us-west-2",
                                       "af-south-1",
                                       "ap-east-1",
                                       "ap-south-1",
                                       "ap-south-2",
                                       "ap-southeast-1",
                                       "ap-southeast-2",
                                       "ap-southeast-3",
                                       "ap-southeast-4",
                                       "ap-northeast-1",
                                       "ap-northeast-2",
                                       "ap-northeast-3",
                                       "ca-central-1",
                                       "eu-central-1",
                                       "eu-central-2",
                                       "eu-west-1",
                                       "eu-west-2",
                                       "eu-west-3",
                                       "eu-south-1",
                                       "eu-south-2",
                                       "eu-north-1",
                                       "il-central-1",
                                       "me-south-1",
                                       "me-central-1",
                                       "sa-east-1"];

/// Errors encounterable while listing regions
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// A region name was blank
  #[error("region name is empty")]
  Empty,
  /// A region name had characters no region has
  #[error("invalid region name {0:?}")]
  Invalid(String),
  /// Filesystem error
  #[error("reading regions file: {0}")]
  Io(#[from] std::io::Error),
  /// File exists but is not a json array of strings
  #[error("parsing regions file: {0}")]
  Json(#[from] serde_json::Error),
}

/// A region, the partition the pool fans work out over
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Ser, De)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
  /// Validate a region name (`[a-z0-9-]+`, surrounding whitespace ignored)
  pub fn new(name: impl AsRef<str>) -> Result<Self, Error> {
    let name = name.as_ref().trim();

    match name {
      | "" => Err(Error::Empty),
      | n if n.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') => {
        Ok(Self(n.to_string()))
      },
      | n => Err(Error::Invalid(n.to_string())),
    }
  }

  /// The region's name
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Region {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl FromStr for Region {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Error> {
    Self::new(s)
  }
}

impl std::convert::TryFrom<String> for Region {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Error> {
    Self::new(s)
  }
}

impl From<Region> for String {
  fn from(r: Region) -> String {
    r.0
  }
}

/// Parse a comma separated list of regions, dropping repeats
pub fn parse_list(list: &str) -> Result<Vec<Region>, Error> {
  list.split(',')
      .filter(|s| !s.trim().is_empty())
      .map(Region::new)
      .collect::<Result<Vec<_>, _>>()
      .map(dedupe)
}

/// Drop repeated regions, keeping the first occurrence of each
pub fn dedupe(regions: Vec<Region>) -> Vec<Region> {
  let mut seen = std::collections::HashSet::new();
  regions.into_iter().filter(|r| seen.insert(r.clone())).collect()
}

/// Something that can say which regions to fan out over.
///
/// Listing can fail; callers turn that failure into a single pre-failed job.
pub trait Source: Send + Sync + fmt::Debug {
  /// List the regions
  fn regions(&self) -> Result<Vec<Region>, Error>;
}

/// A fixed list of regions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Static(pub Vec<Region>);

impl Static {
  /// [`DEFAULT_REGIONS`]
  pub fn defaults() -> Self {
    Self(DEFAULT_REGIONS.iter()
                        .map(|r| Region((*r).to_string()))
                        .collect())
  }
}

impl Source for Static {
  fn regions(&self) -> Result<Vec<Region>, Error> {
    Ok(dedupe(self.0.clone()))
  }
}

/// A comma separated list, parsed when the regions are asked for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listed(pub String);

impl Source for Listed {
  fn regions(&self) -> Result<Vec<Region>, Error> {
    parse_list(&self.0)
  }
}

/// A json file containing an array of region names, e.g. `["us-east-1", "eu-west-1"]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonFile(pub PathBuf);

impl Source for JsonFile {
  fn regions(&self) -> Result<Vec<Region>, Error> {
    std::fs::read_to_string(&self.0).map_err(Error::Io)
                                    .and_then(|json| serde_json::from_str::<Vec<Region>>(&json).map_err(Error::Json))
                                    .map(dedupe)
  }
}

impl<S: Source + ?Sized> Source for Box<S> {
  fn regions(&self) -> Result<Vec<Region>, Error> {
    (**self).regions()
  }
}
