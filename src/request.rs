//! The per-request contract understood by the [`Dispatcher`](crate::Dispatcher).

use crate::{validate, Error, Result};
use http::{Method, StatusCode};
use serde_json::Value;

/// Request parameters, keyed by name. Keys are kept sorted.
pub type Parameters = serde_json::Map<String, Value>;

/// Post-conversion hook run on a successfully converted output.
///
/// Interceptors run in order, after conversion and before the success
/// callback. They are side effects only and cannot fail.
pub type Interceptor<R> = fn(&R, &mut <R as ServiceRequest>::Output);

/// How request parameters are put on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParameterEncoding {
    /// Percent-encoded pairs: in the query string for `GET`, `HEAD` and
    /// `DELETE`, as an `application/x-www-form-urlencoded` body otherwise.
    #[default]
    Url,
    /// A JSON object body.
    Json,
}

/// Describes one request/response exchange.
///
/// Implementors are immutable values created fresh for every call. Only
/// [`base_url`](Self::base_url), [`endpoint`](Self::endpoint) and
/// [`convert`](Self::convert) are required; the rest have the defaults a
/// typical form-style API needs.
///
/// # Examples
///
/// ```
/// use trenes::{Result, ServiceRequest};
/// use serde_json::Value;
///
/// struct Ping;
///
/// impl ServiceRequest for Ping {
///     type Output = ();
///
///     fn base_url(&self) -> &str {
///         "https://api.example.com"
///     }
///
///     fn endpoint(&self) -> &str {
///         "/ping"
///     }
///
///     fn convert(&self, _payload: Option<Value>) -> Result<()> {
///         Ok(())
///     }
/// }
/// ```
pub trait ServiceRequest: Send + Sync + Sized + 'static {
    /// The typed result delivered to the success callback.
    type Output: Send + 'static;

    /// The base URL the endpoint is appended to.
    fn base_url(&self) -> &str;

    /// The endpoint path, appended to the base URL path.
    fn endpoint(&self) -> &str;

    /// The HTTP method. Defaults to `POST`.
    fn method(&self) -> Method {
        Method::POST
    }

    /// The parameter encoding. Defaults to [`ParameterEncoding::Url`].
    fn encoding(&self) -> ParameterEncoding {
        ParameterEncoding::Url
    }

    /// Builds the request parameters.
    ///
    /// # Errors
    ///
    /// Return [`Error::missing_parameter`] when a required value is not
    /// available; the request is then never sent.
    fn params(&self) -> Result<Parameters> {
        Ok(Parameters::new())
    }

    /// Validates the raw response before decoding.
    ///
    /// Defaults to [`validate::default_policy`].
    fn validate(&self, status: StatusCode, body: Option<&[u8]>) -> Option<Error> {
        validate::default_policy(status, body)
    }

    /// Converts the parsed payload into the output type.
    ///
    /// `payload` is `None` when the response body was empty. Requests that
    /// expect no data must succeed in that case.
    fn convert(&self, payload: Option<Value>) -> Result<Self::Output>;

    /// Hooks run on the converted output, in order. Empty by default.
    fn interceptors(&self) -> Vec<Interceptor<Self>> {
        Vec::new()
    }
}
