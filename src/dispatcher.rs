//! Asynchronous, cancellable dispatch of [`ServiceRequest`]s.
//!
//! The [`Dispatcher`] is the main entry point. It resolves a request into a
//! [`WireRequest`], hands it to its [`Transport`], validates and decodes the
//! response, and reports the outcome through one of two callbacks. Use
//! [`DispatcherBuilder`] to configure one backed by HTTP.

use crate::metadata::WireRequest;
use crate::registry::{TaskId, TaskRegistry};
use crate::request::ServiceRequest;
use crate::transport::{HttpTransport, Transport};
use crate::{Error, ErrorKind, Result};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Dispatches requests and tracks them until they complete.
///
/// The dispatcher is cheap to clone; clones share the same task registry.
/// Every call to [`dispatch`](Self::dispatch) either fails synchronously or
/// registers exactly one task, which is removed exactly once: when it
/// completes, or when it is cancelled. Completed tasks invoke exactly one of
/// the two callbacks; cancelled tasks invoke neither, and neither do tasks
/// whose transport panics.
///
/// Callbacks run on the Tokio worker that completed the exchange. Handing
/// results over to a UI thread is up to the caller.
///
/// # Examples
///
/// ```no_run
/// use trenes::{Dispatcher, TimetableRequest};
///
/// # async fn example() -> Result<(), trenes::Error> {
/// let dispatcher = Dispatcher::builder()
///     .default_header("User-Agent", "trenes/0.1")?
///     .build()?;
///
/// let id = dispatcher.dispatch(
///     TimetableRequest::new(41),
///     |response| println!("{} trains", response.items().len()),
///     |error| eprintln!("failed: {error}"),
/// );
///
/// if let Some(id) = id {
///     dispatcher.cancel(&id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<T = HttpTransport> {
    inner: Arc<DispatcherInner<T>>,
}

struct DispatcherInner<T> {
    transport: T,
    registry: TaskRegistry,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Dispatcher<HttpTransport> {
    /// Creates a new [`DispatcherBuilder`] for an HTTP backed dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher sending through `transport`.
    pub fn with_transport(transport: T) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                registry: TaskRegistry::new(),
            }),
        }
    }

    /// Dispatches `request` and returns the identifier of the new task.
    ///
    /// Parameters are built synchronously. If that fails, nothing is
    /// registered, `on_failure` is invoked before this method returns and
    /// `None` is returned. The same happens when called outside a Tokio
    /// runtime. Otherwise the exchange is spawned on the current runtime and
    /// its identifier returned immediately; pass it to
    /// [`cancel`](Self::cancel) to abort the exchange.
    pub fn dispatch<R, S, F>(&self, request: R, on_success: S, on_failure: F) -> Option<TaskId>
    where
        R: ServiceRequest,
        S: FnOnce(R::Output) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        let wire = match WireRequest::from_service_request(&request) {
            Ok(wire) => wire,
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "Could not build request");
                on_failure(e);
                return None;
            }
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::error!(error = %e, "Dispatch requires a Tokio runtime");
                on_failure(Error::with_source(ErrorKind::UnknownError, e));
                return None;
            }
        };

        let inner = Arc::clone(&self.inner);
        let id = self.inner.registry.register(move |id| {
            runtime.spawn(async move {
                let registration = Registration::new(&inner.registry, &id);
                let outcome = exchange(&inner.transport, &request, wire, &id).await;

                if !registration.release() {
                    tracing::debug!(task_id = %id, "Task was cancelled, discarding outcome");
                    return;
                }

                match outcome {
                    Ok(output) => on_success(output),
                    Err(e) => on_failure(e),
                }
            })
        });

        tracing::debug!(task_id = %id, in_flight = self.in_flight(), "Dispatched request");
        Some(id)
    }

    /// Cancels the task registered under `id`.
    ///
    /// Unknown (or already completed) identifiers are ignored. A cancelled
    /// task never invokes its callbacks.
    pub fn cancel(&self, id: &TaskId) {
        if self.inner.registry.cancel(id) {
            tracing::debug!(task_id = %id, "Cancelled request");
        }
    }

    /// Cancels every task currently in flight.
    pub fn cancel_all(&self) {
        let cancelled = self.inner.registry.cancel_all();
        if cancelled > 0 {
            tracing::debug!(cancelled, "Cancelled all requests");
        }
    }

    /// Returns `true` if `id` is still in flight.
    pub fn is_in_flight(&self, id: &TaskId) -> bool {
        self.inner.registry.contains(id)
    }

    /// Returns the number of tasks in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    /// Returns `true` while any task is in flight.
    ///
    /// This is the signal a network activity indicator should follow.
    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    /// Subscribes to changes of the number of tasks in flight.
    pub fn subscribe_activity(&self) -> watch::Receiver<usize> {
        self.inner.registry.subscribe()
    }
}

/// Sends one request and turns the response into the request's output.
async fn exchange<R, T>(
    transport: &T,
    request: &R,
    wire: WireRequest,
    id: &TaskId,
) -> Result<R::Output>
where
    R: ServiceRequest,
    T: Transport,
{
    let start_time = Instant::now();

    tracing::debug!(
        task_id = %id,
        method = %wire.method,
        url = %wire.url,
        "Executing HTTP request"
    );

    let response = match transport.send(wire).await {
        Ok(Some(response)) => response,
        Ok(None) => {
            let e = Error::new(ErrorKind::NoResponseReceived);
            tracing::error!(task_id = %id, "{e}");
            return Err(e);
        }
        Err(source) => {
            tracing::warn!(task_id = %id, error = %source, "Request failed");
            return Err(Error::with_source(ErrorKind::Transport, source));
        }
    };

    tracing::info!(
        task_id = %id,
        status = response.status.as_u16(),
        latency_ms = start_time.elapsed().as_millis(),
        "Received HTTP response"
    );

    let body = Some(response.body.as_slice()).filter(|body| !body.is_empty());

    if let Some(e) = validate(request, response.status, body) {
        tracing::warn!(task_id = %id, code = e.code(), error = %e, "Response rejected");
        return Err(e);
    }

    let Some(body) = body else {
        return convert(request, None);
    };

    tracing::trace!(task_id = %id, body = %String::from_utf8_lossy(body), "Received body");

    let payload: Value = serde_json::from_slice(body).map_err(|e| {
        tracing::error!(task_id = %id, error = %e, "Failed to parse response body");
        Error::with_source(
            ErrorKind::SerializerFailed,
            Error::with_source(ErrorKind::JsonParsingFailed, e),
        )
    })?;

    convert(request, Some(payload)).inspect_err(|e| {
        tracing::error!(task_id = %id, error = %e, "Failed to convert response");
    })
}

/// Runs the request's validator, mapping a panic to [`ErrorKind::UnknownError`].
fn validate<R: ServiceRequest>(
    request: &R,
    status: StatusCode,
    body: Option<&[u8]>,
) -> Option<Error> {
    panic::catch_unwind(AssertUnwindSafe(|| request.validate(status, body)))
        .unwrap_or_else(|_| Some(Error::new(ErrorKind::UnknownError)))
}

/// Runs the request's conversion and interceptors, mapping panics to
/// [`ErrorKind::UnknownError`].
fn convert<R: ServiceRequest>(request: &R, payload: Option<Value>) -> Result<R::Output> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let mut output = request.convert(payload)?;
        for interceptor in request.interceptors() {
            interceptor(request, &mut output);
        }
        Ok(output)
    }))
    .unwrap_or_else(|_| Err(Error::new(ErrorKind::UnknownError)))
}

/// A task's registry entry, released when the task ends.
///
/// Dropping an unreleased registration releases it, so an exchange that
/// unwinds still leaves the registry.
struct Registration<'a> {
    registry: &'a TaskRegistry,
    id: &'a TaskId,
    released: bool,
}

impl<'a> Registration<'a> {
    fn new(registry: &'a TaskRegistry, id: &'a TaskId) -> Self {
        Self {
            registry,
            id,
            released: false,
        }
    }

    /// Returns `false` if the task was cancelled in the meantime.
    fn release(mut self) -> bool {
        self.released = true;
        self.registry.release(self.id)
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        if !self.released && self.registry.release(self.id) {
            tracing::error!(task_id = %self.id, "Exchange ended without an outcome");
        }
    }
}

/// Builder for an HTTP backed [`Dispatcher`].
///
/// # Examples
///
/// ```
/// use trenes::DispatcherBuilder;
///
/// # fn example() -> Result<(), trenes::Error> {
/// let dispatcher = DispatcherBuilder::new()
///     .default_header("User-Agent", "trenes/0.1")?
///     .build()?;
/// assert!(!dispatcher.is_busy());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    default_headers: HeaderMap,
}

impl DispatcherBuilder {
    /// Creates a builder with no default headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::UnknownError`] if the name or value is invalid.
    pub fn default_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::with_source(ErrorKind::UnknownError, e))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::with_source(ErrorKind::UnknownError, e))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Builds the dispatcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be created.
    pub fn build(self) -> Result<Dispatcher> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::with_source(ErrorKind::UnknownError, e))?;

        Ok(Dispatcher::with_transport(HttpTransport::new(
            client,
            self.default_headers,
        )))
    }
}
