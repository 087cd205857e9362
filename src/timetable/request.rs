//! The request for one line's live timetable.

use super::TimetableResponse;
use crate::request::{Interceptor, Parameters, ServiceRequest};
use crate::{Error, ErrorKind, Result};
use chrono::Local;
use http::Method;
use serde_json::Value;

/// Base URL of the public timetable API.
pub const DEFAULT_BASE_URL: &str = "http://trenes.mininterior.gov.ar/apps";

const ENDPOINT: &str = "/api_tiempos_temp.php";

/// Fetches the live timetable of one line.
///
/// Sent as `GET {base}/api_tiempos_temp.php?ramal={line}`. The decoded
/// [`TimetableResponse`] is stamped with the requested line id.
///
/// # Examples
///
/// ```
/// use trenes::{ServiceRequest, TimetableRequest};
///
/// let request = TimetableRequest::new(41);
/// assert_eq!(request.line_id(), 41);
/// assert_eq!(request.base_url(), "http://trenes.mininterior.gov.ar/apps");
/// assert_eq!(request.endpoint(), "/api_tiempos_temp.php");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableRequest {
    line_id: i32,
    base_url: String,
}

impl TimetableRequest {
    /// Creates a request for `line_id` against the public API.
    pub fn new(line_id: i32) -> Self {
        Self {
            line_id,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Points the request at another server, e.g. a mirror or a test double.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The requested line.
    pub fn line_id(&self) -> i32 {
        self.line_id
    }
}

impl ServiceRequest for TimetableRequest {
    type Output = TimetableResponse;

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> &str {
        ENDPOINT
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn params(&self) -> Result<Parameters> {
        let mut params = Parameters::new();
        params.insert("ramal".to_string(), Value::from(self.line_id));
        Ok(params)
    }

    fn convert(&self, payload: Option<Value>) -> Result<TimetableResponse> {
        let payload = payload.ok_or_else(|| Error::new(ErrorKind::NoDataReceived))?;
        TimetableResponse::from_json(&payload, Local::now().naive_local())
            .map_err(|e| Error::with_source(ErrorKind::SerializerFailed, e))
    }

    fn interceptors(&self) -> Vec<Interceptor<Self>> {
        vec![stamp_line_id]
    }
}

fn stamp_line_id(request: &TimetableRequest, response: &mut TimetableResponse) {
    response.set_line_id(request.line_id);
}
