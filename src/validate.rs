//! Response validators.
//!
//! A validator is a pure function from the HTTP status and the optional
//! response body to an optional [`Error`]. Returning `None` accepts the
//! response and lets the dispatcher go on decoding it.

use crate::{Error, ErrorKind};
use http::StatusCode;

/// The default policy: accept any 2xx status, reject everything else.
///
/// A rejected response whose body is non-empty UTF-8 text produces an error
/// with the message `"[<status>] - <text>"`. Otherwise the error only carries
/// the status code. An empty body counts as no body, so a bodiless `503`
/// reads "status code was 503" rather than `"[503] - "`.
///
/// # Examples
///
/// ```
/// use trenes::validate::default_policy;
/// use http::StatusCode;
///
/// assert!(default_policy(StatusCode::OK, None).is_none());
///
/// let err = default_policy(StatusCode::NOT_FOUND, Some(b"not found")).unwrap();
/// assert_eq!(err.to_string(), "[404] - not found");
/// assert_eq!(err.code(), 404);
/// ```
pub fn default_policy(status: StatusCode, body: Option<&[u8]>) -> Option<Error> {
    if status.is_success() {
        return None;
    }

    let message = body
        .filter(|bytes| !bytes.is_empty())
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .map(str::to_owned);

    Some(Error::new(ErrorKind::HttpStatus { status, message }))
}

/// Accepts every response, whatever its status.
pub fn accept_any(_status: StatusCode, _body: Option<&[u8]>) -> Option<Error> {
    None
}
