use std::{error::Error as _, time::Instant};

use reqwest::blocking::{Client, Response};
use serde::{Deserialize as De, Serialize as Ser};

use crate::{fanout,
            pool::{Ctx, Job},
            region::{Region, Source},
            report,
            soft::{self, ApiError, Policy}};

/// Error body shapes returned by AWS json and query APIs
#[derive(De)]
struct ErrorBody {
  #[serde(alias = "Code", alias = "__type")]
  code: Option<String>,
  #[serde(alias = "Message")]
  message: Option<String>,
}

/// A regional endpoint answered
#[derive(Clone, Debug, PartialEq, Eq, Ser, De)]
pub struct Probe {
  /// Region that was probed
  pub region: Region,
  /// HTTP status of the answer
  pub status: u16,
  /// Round trip time
  pub elapsed_ms: u64,
}

/// Makes HTTP requests against one regional endpoint per region
#[derive(Clone, Debug)]
pub struct Api {
  endpoint: String,
  client: &'static Client,
}

impl Api {
  /// Create a new instance.
  ///
  /// `endpoint` is a url template where `{region}` is replaced by the region's name.
  pub fn new(endpoint: impl ToString, client: &'static Client) -> Self {
    Self { endpoint: endpoint.to_string(),
           client }
  }

  /// The url probed for `region`
  pub fn url(&self, region: &Region) -> String {
    self.endpoint.replace("{region}", region.as_str())
  }

  /// GET the regional endpoint, succeeding on any 2xx
  pub fn probe(&self, region: &Region) -> Result<Probe, ApiError> {
    let started = Instant::now();

    self.client
        .get(self.url(region))
        .send()
        .map_err(transport_error)
        .and_then(|rep| match rep.status().is_success() {
          | true => Ok(rep),
          | false => Err(status_error(rep)),
        })
        .map(|rep| Probe { region: region.clone(),
                           status: rep.status().as_u16(),
                           elapsed_ms: report::millis(started.elapsed()) })
  }
}

fn transport_error(e: reqwest::Error) -> ApiError {
  // dns failures only show up at the bottom of the source chain
  let mut message = e.to_string();
  let mut source = e.source();
  while let Some(s) = source {
    message = format!("{}: {}", message, s);
    source = s.source();
  }

  ApiError::new(e.status(), "Transport", message)
}

fn status_error(rep: Response) -> ApiError {
  let status = rep.status();
  let text = rep.text().unwrap_or_default();

  match serde_json::from_str::<ErrorBody>(&text) {
    | Ok(ErrorBody { code, message }) => ApiError::new(Some(status),
                                                        code.unwrap_or_else(|| status.to_string()),
                                                        message.unwrap_or(text)),
    | Err(_) => ApiError::new(Some(status), status.canonical_reason().unwrap_or("Unknown"), text),
  }
}

/// One probe job per region listed by `source`.
///
/// If `source` fails, the result is a single pre-failed job carrying that failure.
pub fn jobs<P>(api: &Api, source: &dyn Source, policy: P) -> Vec<Job<Vec<Probe>>>
  where P: Policy + Clone
{
  fanout::per_partition(|| source.regions(), |region: Region| {
    let api = api.clone();
    let policy = policy.clone();

    move |ctx: Ctx| {
      log::debug!("probe: job {} calling {}", ctx.index(), api.url(&region));
      soft::recover(api.probe(&region).map(|p| vec![p]),
                    &policy,
                    region.as_str(),
                    Vec::new)
    }
  })
}
