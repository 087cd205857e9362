//! Decode errors for timetable payloads.

/// Why a timetable payload, or one object inside it, could not be decoded.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The value is not a JSON object.
    #[error("expected a JSON object")]
    NotAnObject,

    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A field holds a value of the wrong JSON type.
    #[error("field `{field}` is not {expected}")]
    WrongType {
        /// The offending field.
        field: String,
        /// What the field should have been.
        expected: &'static str,
    },

    /// A field holds a value of the right type that cannot be interpreted.
    #[error("field `{field}` has invalid value `{value}`")]
    InvalidValue {
        /// The offending field.
        field: String,
        /// The raw value, as text.
        value: String,
    },

    /// The service type code is not one we know.
    #[error("unknown service type `{0}`")]
    UnknownServiceType(String),

    /// The train status is not one we know.
    #[error("unknown train status `{0}`")]
    UnknownStatus(String),

    /// The server date and time could not be parsed as `dd/MM/yy HH:mm`.
    #[error("invalid server timestamp `{0}`")]
    InvalidTimestamp(String),

    /// One of the six intermediate slots failed, which fails the whole object.
    #[error("intermediate slot {slot}: {source}")]
    Slot {
        /// The failing suffix, 1 to 6.
        slot: u8,
        /// Why the slot failed.
        source: Box<DecodeError>,
    },

    /// The object matches neither the terminus nor the intermediate shape.
    #[error("neither a terminus entry ({terminus}) nor an intermediate entry ({intermediate})")]
    Unrecognized {
        /// Why the terminus attempt failed.
        terminus: Box<DecodeError>,
        /// Why the intermediate attempt failed.
        intermediate: Box<DecodeError>,
    },
}
