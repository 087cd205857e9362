//! Assembly of a full timetable response.

use super::fields::Fields;
use super::item::{decode_entry, IntermediateItem, TerminusItem, TimetableItem, UNKNOWN_LINE};
use super::DecodeError;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

/// Format of the server's `fecha` and `hora` fields joined by a space.
const SERVER_TIMESTAMP_FORMAT: &str = "%d/%m/%y %H:%M";

/// Source arrays, in the order their items are concatenated.
const ITEM_ARRAYS: [&str; 3] = ["salidas", "salidas2", "intermedias"];

/// A decoded timetable for one line.
///
/// Items keep the payload's grouping: departures from the first terminus,
/// then departures from the second terminus, then intermediate arrivals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimetableResponse {
    line_id: i32,
    timestamp: NaiveDateTime,
    message: Option<String>,
    items: Vec<TimetableItem>,
}

impl TimetableResponse {
    /// Decodes a full payload relative to the local wall-clock time `now`.
    ///
    /// Objects that match neither item shape are skipped. The line id is
    /// left as [`UNKNOWN_LINE`] until [`set_line_id`](Self::set_line_id).
    ///
    /// # Errors
    ///
    /// Fails if the payload is not an object, if `fecha`/`hora` do not form
    /// a `dd/MM/yy HH:mm` timestamp, or if any of `salidas`, `salidas2`,
    /// `intermedias` (arrays of objects) or `alertas` (object) is missing or
    /// mistyped.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Local;
    /// use serde_json::json;
    /// use trenes::TimetableResponse;
    ///
    /// let payload = json!({
    ///     "fecha": "01/01/20", "hora": "10:00",
    ///     "salidas": [], "salidas2": [], "intermedias": [],
    ///     "alertas": {}
    /// });
    /// let response = TimetableResponse::from_json(&payload, Local::now().naive_local()).unwrap();
    /// assert_eq!(response.timestamp().to_string(), "2020-01-01 10:00:00");
    /// assert!(response.items().is_empty());
    /// assert_eq!(response.message(), None);
    /// ```
    pub fn from_json(payload: &Value, now: NaiveDateTime) -> Result<Self, DecodeError> {
        let fields = Fields::new(payload)?;
        let timestamp = server_timestamp(fields)?;

        let groups = ITEM_ARRAYS
            .iter()
            .map(|key| object_array(fields, key))
            .collect::<Result<Vec<_>, _>>()?;
        let alerts = fields.object("alertas")?;

        let mut items = Vec::new();
        for (key, objects) in ITEM_ARRAYS.iter().zip(groups) {
            for (index, object) in objects.iter().enumerate() {
                match decode_entry(object, now) {
                    Ok(entry) => items.extend(entry.into_items()),
                    Err(e) => {
                        tracing::debug!(array = *key, index, error = %e, "Skipping timetable entry")
                    }
                }
            }
        }

        for item in items.iter().filter_map(TimetableItem::as_intermediate) {
            tracing::trace!(
                id = %item.passthrough_id,
                train = %item.train_number,
                "Intermediate entry"
            );
        }

        Ok(Self {
            line_id: UNKNOWN_LINE,
            timestamp,
            message: alerts.optional_str("mensaje").map(str::to_owned),
            items,
        })
    }

    /// The line (branch) this timetable belongs to.
    pub fn line_id(&self) -> i32 {
        self.line_id
    }

    /// Sets the line this timetable belongs to.
    pub fn set_line_id(&mut self, line_id: i32) {
        self.line_id = line_id;
    }

    /// The server time the timetable was generated at.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// The service alert, if any.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// All items, in payload group order.
    pub fn items(&self) -> &[TimetableItem] {
        &self.items
    }

    /// Departures from both termini.
    pub fn terminus_items(&self) -> impl Iterator<Item = &TerminusItem> {
        self.items.iter().filter_map(TimetableItem::as_terminus)
    }

    /// Arrivals at intermediate stations.
    pub fn intermediate_items(&self) -> impl Iterator<Item = &IntermediateItem> {
        self.items.iter().filter_map(TimetableItem::as_intermediate)
    }

    /// Consumes the response, returning its items.
    pub fn into_items(self) -> Vec<TimetableItem> {
        self.items
    }
}

fn server_timestamp(fields: Fields<'_>) -> Result<NaiveDateTime, DecodeError> {
    let joined = format!("{} {}", fields.str("fecha")?, fields.str("hora")?);
    NaiveDateTime::parse_from_str(&joined, SERVER_TIMESTAMP_FORMAT)
        .map_err(|_| DecodeError::InvalidTimestamp(joined))
}

fn object_array<'a>(fields: Fields<'a>, key: &str) -> Result<&'a [Value], DecodeError> {
    let values = fields.array(key)?;
    if values.iter().all(Value::is_object) {
        Ok(values)
    } else {
        Err(DecodeError::WrongType {
            field: key.to_owned(),
            expected: "an array of objects",
        })
    }
}
