//! # Trenes - live timetables for Buenos Aires commuter rail
//!
//! Trenes is a typed client for the public commuter rail timetable API. It
//! pairs a small request dispatch engine, built on `reqwest` and `tokio`, with
//! a decoder that turns the API's loosely shaped JSON into typed timetable
//! items.
//!
//! ## Quick Start
//!
//! ```no_run
//! use trenes::{Dispatcher, TimetableItem, TimetableRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), trenes::Error> {
//!     let dispatcher = Dispatcher::builder().build()?;
//!     let (tx, rx) = tokio::sync::oneshot::channel();
//!
//!     dispatcher.dispatch(
//!         TimetableRequest::new(41),
//!         |response| {
//!             let _ = tx.send(response);
//!         },
//!         |error| eprintln!("Request failed ({}): {}", error.code(), error),
//!     );
//!
//!     if let Ok(response) = rx.await {
//!         for item in response.items() {
//!             match item {
//!                 TimetableItem::Terminus(departure) => {
//!                     println!("{} from platform {}", departure.timestamp, departure.platform)
//!                 }
//!                 TimetableItem::Intermediate(arrival) => {
//!                     println!("{} train {}", arrival.timestamp, arrival.train_number)
//!                 }
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Callback dispatch** - Every request reports through exactly one of two callbacks
//! - **Cancellation** - Requests are tracked by [`TaskId`] and can be cancelled singly or all at once
//! - **Activity tracking** - Watch the number of in-flight requests to drive an activity indicator
//! - **Coded errors** - Every failure carries a stable numeric code and its chained cause
//! - **Pluggable transport** - Swap the HTTP stack for a test double through [`transport::Transport`]
//! - **Automatic logging** - Structured logging with `tracing`
//!
//! ## Error Handling
//!
//! Errors keep their causes, so a parse failure can be told apart from a
//! response of the wrong shape:
//!
//! ```
//! use trenes::{Error, ErrorKind};
//!
//! fn describe(error: &Error) -> String {
//!     match (error.kind(), error.underlying().map(Error::kind)) {
//!         (ErrorKind::SerializerFailed, Some(ErrorKind::JsonParsingFailed)) => {
//!             "the server sent something that is not JSON".to_string()
//!         }
//!         (ErrorKind::HttpStatus { status, .. }, _) => format!("server said {status}"),
//!         _ => error.to_string(),
//!     }
//! }
//!
//! assert_eq!(
//!     describe(&Error::new(ErrorKind::NoDataReceived)),
//!     "No data received from endpoint"
//! );
//! ```
//!
//! ## Custom Requests
//!
//! Any endpoint can be described by implementing [`ServiceRequest`]; see its
//! documentation for an example.

mod dispatcher;
mod error;
pub mod catalog;
pub mod metadata;
mod registry;
mod request;
pub mod timetable;
pub mod transport;
pub mod validate;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{BoxError, Error, ErrorKind, Result};
pub use registry::TaskId;
pub use request::{Interceptor, ParameterEncoding, Parameters, ServiceRequest};
pub use timetable::{
    IntermediateItem, ServiceType, TerminusItem, TimetableItem, TimetableRequest,
    TimetableResponse, TrainStatus,
};
