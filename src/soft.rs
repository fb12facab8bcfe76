//! Deciding which API failures are not really failures.
//!
//! A region where the caller lacks permission, or where a service simply
//! isn't offered, should not fail a whole multi-region query. Work closures
//! run their API results through a [`Policy`] via [`recover`], which turns
//! such errors into [`Outcome::SoftSkip`] instead of [`Outcome::Fail`].

use std::fmt;

use http::StatusCode;

use crate::pool::{Error, Outcome};

/// Substrings marking an authorization failure
const ACCESS_DENIED_MARKERS: &[&str] = &["AccessDenied", "UnauthorizedOperation", "AuthorizationError"];

/// Substrings marking a request rejected because a feature is off for the account
const BAD_REQUEST_MARKERS: &[&str] = &["BadRequest", "feature is not enabled"];

/// Substrings marking a service that has no endpoint in a region
const NOT_IN_REGION_MARKERS: &[&str] = &["no such host",
                                         "dns error",
                                         "UnknownEndpoint",
                                         "could not resolve endpoint"];

/// An error returned by (or on the way to) a cloud API
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
  /// HTTP status, `None` if the request never got a response
  pub status: Option<StatusCode>,
  /// Machine readable error code, e.g. `AccessDeniedException`
  pub code: String,
  /// Human readable message
  pub message: String,
}

impl fmt::Display for ApiError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.status {
      | Some(status) => write!(f, "{} {}: {}", status.as_u16(), self.code, self.message),
      | None => write!(f, "{}: {}", self.code, self.message),
    }
  }
}

impl std::error::Error for ApiError {}

impl ApiError {
  /// Create a new instance
  pub fn new(status: Option<StatusCode>, code: impl ToString, message: impl ToString) -> Self {
    Self { status,
           code: code.to_string(),
           message: message.to_string() }
  }

  fn mentions_any(&self, markers: &[&str]) -> bool {
    markers.iter()
           .any(|m| self.code.contains(m) || self.message.contains(m))
  }

  /// 400 or 403 complaining about authorization
  pub fn is_access_denied(&self) -> bool {
    let denied_status = self.status == Some(StatusCode::BAD_REQUEST) || self.status == Some(StatusCode::FORBIDDEN);
    denied_status && self.mentions_any(ACCESS_DENIED_MARKERS)
  }

  /// 400 saying the feature is not enabled for the account
  pub fn is_bad_request(&self) -> bool {
    self.status == Some(StatusCode::BAD_REQUEST) && self.mentions_any(BAD_REQUEST_MARKERS)
  }

  /// The service has no endpoint in the region that was asked
  pub fn is_service_not_available_in_region(&self) -> bool {
    self.mentions_any(NOT_IN_REGION_MARKERS)
  }
}

/// Whether an error should fail its job
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
  /// Record an empty result and carry on
  Soft,
  /// Fail the job
  Hard,
}

/// Classifies API errors as soft or hard
pub trait Policy: 'static + Send + Sync + fmt::Debug {
  /// Decide what `err` means for the job that hit it
  fn classify(&self, err: &ApiError) -> Verdict;
}

/// Access denied and missing regional endpoints are soft, everything else is hard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {
  fn classify(&self, err: &ApiError) -> Verdict {
    match err.is_access_denied() || err.is_service_not_available_in_region() {
      | true => Verdict::Soft,
      | false => Verdict::Hard,
    }
  }
}

/// Like [`DefaultPolicy`], and bad requests are soft too.
///
/// For services that answer 400 when a feature is not enabled for the account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LenientPolicy;

impl Policy for LenientPolicy {
  fn classify(&self, err: &ApiError) -> Verdict {
    match err.is_bad_request() {
      | true => Verdict::Soft,
      | false => DefaultPolicy.classify(err),
    }
  }
}

/// Every error is hard
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StrictPolicy;

impl Policy for StrictPolicy {
  fn classify(&self, _: &ApiError) -> Verdict {
    Verdict::Hard
  }
}

/// Turn an API result into a job outcome.
///
/// Soft errors become `SoftSkip(empty())`, hard errors `Fail`.
pub fn recover<T>(res: Result<T, ApiError>,
                  policy: &dyn Policy,
                  partition: &str,
                  empty: impl FnOnce() -> T)
                  -> Outcome<T> {
  match res {
    | Ok(t) => Outcome::Success(t),
    | Err(e) => match policy.classify(&e) {
      | Verdict::Soft => {
        log::warn!("{}: skipping, could not access API: {}", partition, e);
        Outcome::SoftSkip(empty())
      },
      | Verdict::Hard => Outcome::Fail(Error::work(e)),
    },
  }
}
