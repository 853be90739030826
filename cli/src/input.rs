//! Validation of the raw command-line inputs.

use reqcheck_core::RequestDescriptor;
use serde_json::Value as Json;
use tracing::debug;

/// Input problems that stop the run before any request is made.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Error: Request string is required. Use --request option to provide a request string.")]
    MissingRequest,

    #[error("Error: Request string is not properly formatted JSON. Use --request option to provide a request string.")]
    MalformedRequest,
}

/// Parse `--request`. An empty string counts as missing.
pub fn parse_request(raw: Option<&str>) -> Result<RequestDescriptor, InputError> {
    let raw = raw.filter(|r| !r.is_empty()).ok_or(InputError::MissingRequest)?;
    let json: Json = serde_json::from_str(raw).map_err(|err| {
        debug!(%err, "request is not JSON");
        InputError::MalformedRequest
    })?;
    RequestDescriptor::try_from(json).map_err(|err| {
        debug!(%err, "request has the wrong shape");
        InputError::MalformedRequest
    })
}

/// Split `--tests` into one assertion per line. `None` when nothing was given.
pub fn parse_tests(raw: Option<&str>) -> Option<Vec<String>> {
    raw.filter(|t| !t.is_empty())
        .map(|t| t.trim().split('\n').map(str::to_string).collect())
}
