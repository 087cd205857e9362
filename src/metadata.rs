//! Wire-level request built from a [`ServiceRequest`].

use crate::request::{ParameterEncoding, Parameters, ServiceRequest};
use crate::{Error, ErrorKind, Result};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, Method};
use serde_json::Value;
use url::{form_urlencoded, Url};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json";

/// A fully resolved HTTP request, ready for a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// The HTTP method.
    pub method: Method,

    /// The absolute URL, including any encoded query parameters.
    pub url: Url,

    /// Request-specific headers.
    pub headers: HeaderMap,

    /// The encoded body, if the parameters went into one.
    pub body: Option<Vec<u8>>,
}

impl WireRequest {
    /// Creates a bodiless request.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Resolves a service request into a wire request.
    ///
    /// The endpoint is appended to the base URL path, then the parameters
    /// are encoded according to [`ServiceRequest::encoding`].
    ///
    /// # Errors
    ///
    /// A [`ErrorKind::CouldNotBuildParameters`] error from the parameter
    /// builder is returned as is. Any other failure, including an invalid
    /// base URL, is reported as [`ErrorKind::UnknownError`] wrapping the cause.
    ///
    /// # Examples
    ///
    /// ```
    /// use trenes::metadata::WireRequest;
    /// use trenes::TimetableRequest;
    ///
    /// let wire = WireRequest::from_service_request(&TimetableRequest::new(41)).unwrap();
    /// assert_eq!(wire.method, http::Method::GET);
    /// assert_eq!(
    ///     wire.url.as_str(),
    ///     "http://trenes.mininterior.gov.ar/apps/api_tiempos_temp.php?ramal=41"
    /// );
    /// ```
    pub fn from_service_request<R: ServiceRequest>(request: &R) -> Result<Self> {
        let params = request.params().map_err(|e| match e.kind() {
            ErrorKind::CouldNotBuildParameters(_) => e,
            _ => Error::with_source(ErrorKind::UnknownError, e),
        })?;

        let url = join_url(request.base_url(), request.endpoint())?;
        let mut wire = Self::new(request.method(), url);

        if params.is_empty() {
            return Ok(wire);
        }

        match request.encoding() {
            ParameterEncoding::Url => {
                let pairs = query_pairs(&params);
                if encodes_into_url(&wire.method) {
                    wire.url.query_pairs_mut().extend_pairs(&pairs);
                } else {
                    let body = form_urlencoded::Serializer::new(String::new())
                        .extend_pairs(&pairs)
                        .finish();
                    wire.set_body(FORM_CONTENT_TYPE, body.into_bytes());
                }
            }
            ParameterEncoding::Json => {
                let body = serde_json::to_vec(&params)
                    .map_err(|e| Error::with_source(ErrorKind::UnknownError, e))?;
                wire.set_body(JSON_CONTENT_TYPE, body);
            }
        }

        Ok(wire)
    }

    fn set_body(&mut self, content_type: &'static str, body: Vec<u8>) {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = Some(body);
    }
}

fn encodes_into_url(method: &Method) -> bool {
    [Method::GET, Method::HEAD, Method::DELETE].contains(method)
}

/// Appends `endpoint` to the path of `base`, keeping exactly one separator.
fn join_url(base: &str, endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| Error::with_source(ErrorKind::UnknownError, e))?;
    let path = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    );
    url.set_path(&path);
    Ok(url)
}

/// Flattens parameters into sorted `key=value` pairs.
///
/// Nested objects become `key[sub]`, arrays `key[]`, booleans `1`/`0`.
fn query_pairs(params: &Parameters) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (key, value) in params {
        flatten(key, value, &mut pairs);
    }
    // Stable, so array elements keep their order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}

fn flatten(key: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (sub, nested) in map {
                flatten(&format!("{key}[{sub}]"), nested, pairs);
            }
        }
        Value::Array(items) => {
            let key = format!("{key}[]");
            for item in items {
                flatten(&key, item, pairs);
            }
        }
        Value::Bool(flag) => {
            let text = if *flag { "1" } else { "0" };
            pairs.push((key.to_owned(), text.to_owned()))
        }
        Value::String(text) => pairs.push((key.to_owned(), text.clone())),
        Value::Number(number) => pairs.push((key.to_owned(), number.to_string())),
        Value::Null => pairs.push((key.to_owned(), String::new())),
    }
}
