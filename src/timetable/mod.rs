//! The live timetable of a commuter rail line.
//!
//! [`TimetableRequest`] fetches one line's timetable and decodes it into a
//! [`TimetableResponse`]: the server timestamp, an optional service alert
//! and a flat list of [`TimetableItem`]s. Decoding is lenient per object and
//! strict per payload; objects that match no known shape are skipped, while
//! a payload missing one of its sections fails as a whole.

mod error;
mod fields;
mod item;
mod request;
mod response;

pub use error::DecodeError;
pub use item::{
    decode_entry, decode_entry_now, DecodedEntry, IntermediateItem, ServiceType, TerminusItem,
    TimetableItem, TrainStatus, INTERMEDIATE_SLOTS, UNKNOWN_LINE,
};
pub use request::{TimetableRequest, DEFAULT_BASE_URL};
pub use response::TimetableResponse;
