//! Timetable items and the schema-sniffing decoder that produces them.
//!
//! The API returns two kinds of objects in its arrays. Terminus objects
//! describe one departure from an end of the line and carry a platform and a
//! status. Intermediate objects pack six upcoming trains for a stop into
//! numerically suffixed fields (`tren_1` .. `tren_6`). Nothing in the payload
//! says which is which, so [`decode_entry`] tries the terminus shape first
//! and falls back to the intermediate one.

use super::fields::{invalid_value, Fields};
use super::DecodeError;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;
use serde_json::Value;
use std::ops::RangeInclusive;

/// Line id used when a terminus object carries no usable `ramal`.
pub const UNKNOWN_LINE: i32 = -1;

/// Field suffixes of an intermediate object, in delivery order.
pub const INTERMEDIATE_SLOTS: RangeInclusive<u8> = 1..=6;

/// Kind of train service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Regular service, wire code `"N"`.
    Regular,
}

impl ServiceType {
    /// Maps a wire code to a service type.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "N" => Some(ServiceType::Regular),
            _ => None,
        }
    }

    /// Returns the wire code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceType::Regular => "N",
        }
    }
}

/// Status of a train departing from a terminus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainStatus {
    /// `"confirmado"`
    Confirmed,
    /// `"en anden"`: the train is at the platform.
    OnPlatform,
    /// `"a confirmar"`
    NotConfirmed,
}

impl TrainStatus {
    /// Parses a wire status, ignoring case.
    ///
    /// ```
    /// use trenes::TrainStatus;
    ///
    /// assert_eq!(TrainStatus::parse("EN ANDEN"), Some(TrainStatus::OnPlatform));
    /// assert_eq!(TrainStatus::parse("cancelado"), None);
    /// ```
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_lowercase().as_str() {
            "confirmado" => Some(TrainStatus::Confirmed),
            "en anden" => Some(TrainStatus::OnPlatform),
            "a confirmar" => Some(TrainStatus::NotConfirmed),
            _ => None,
        }
    }

    /// Returns the lowercase wire label.
    pub fn label(&self) -> &'static str {
        match self {
            TrainStatus::Confirmed => "confirmado",
            TrainStatus::OnPlatform => "en anden",
            TrainStatus::NotConfirmed => "a confirmar",
        }
    }
}

/// A departure from a terminus station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerminusItem {
    /// Scheduled departure, today at the announced `HH:MM`.
    pub timestamp: NaiveDateTime,
    /// The service type.
    pub service_type: ServiceType,
    /// The line (branch) id, or [`UNKNOWN_LINE`].
    pub line_id: i32,
    /// Opaque `est` value, passed through untouched.
    pub est: Value,
    /// Departure platform.
    pub platform: i32,
    /// Departure status.
    pub status: TrainStatus,
}

/// An upcoming train at an intermediate station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntermediateItem {
    /// Estimated arrival, computed from the announced minutes.
    pub timestamp: NaiveDateTime,
    /// The service type.
    pub service_type: ServiceType,
    /// The line (branch) id.
    pub line_id: i32,
    /// Opaque `est` value, passed through untouched.
    pub est: Value,
    /// Public train number.
    pub train_number: String,
    /// Rolling stock identifier.
    pub train_id: String,
    /// Opaque `_id` shared by the six trains of one object.
    pub passthrough_id: Value,
}

/// One entry of a timetable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimetableItem {
    /// A terminus departure.
    Terminus(TerminusItem),
    /// An intermediate-station arrival.
    Intermediate(IntermediateItem),
}

impl TimetableItem {
    /// When the train departs or arrives.
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            TimetableItem::Terminus(item) => item.timestamp,
            TimetableItem::Intermediate(item) => item.timestamp,
        }
    }

    /// The service type.
    pub fn service_type(&self) -> ServiceType {
        match self {
            TimetableItem::Terminus(item) => item.service_type,
            TimetableItem::Intermediate(item) => item.service_type,
        }
    }

    /// The line (branch) id.
    pub fn line_id(&self) -> i32 {
        match self {
            TimetableItem::Terminus(item) => item.line_id,
            TimetableItem::Intermediate(item) => item.line_id,
        }
    }

    /// The opaque `est` value.
    pub fn est(&self) -> &Value {
        match self {
            TimetableItem::Terminus(item) => &item.est,
            TimetableItem::Intermediate(item) => &item.est,
        }
    }

    /// Returns the terminus item, if this is one.
    pub fn as_terminus(&self) -> Option<&TerminusItem> {
        match self {
            TimetableItem::Terminus(item) => Some(item),
            TimetableItem::Intermediate(_) => None,
        }
    }

    /// Returns the intermediate item, if this is one.
    pub fn as_intermediate(&self) -> Option<&IntermediateItem> {
        match self {
            TimetableItem::Intermediate(item) => Some(item),
            TimetableItem::Terminus(_) => None,
        }
    }
}

/// The result of decoding one JSON object.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEntry {
    /// The object was a terminus entry.
    Terminus(TerminusItem),
    /// The object was an intermediate entry; always six items, in slot order.
    Intermediate(Vec<IntermediateItem>),
}

impl DecodedEntry {
    /// Flattens the entry into timetable items, preserving order.
    pub fn into_items(self) -> Vec<TimetableItem> {
        match self {
            DecodedEntry::Terminus(item) => vec![TimetableItem::Terminus(item)],
            DecodedEntry::Intermediate(items) => {
                items.into_iter().map(TimetableItem::Intermediate).collect()
            }
        }
    }
}

/// Decodes one JSON object relative to the local wall-clock time `now`.
///
/// The terminus shape is always tried first; an object satisfying both
/// shapes decodes as terminus. An intermediate object decodes only if all
/// six slots do.
///
/// # Errors
///
/// [`DecodeError::NotAnObject`] for non-objects, otherwise
/// [`DecodeError::Unrecognized`] carrying why each shape was rejected.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use serde_json::json;
/// use trenes::timetable::{decode_entry, DecodedEntry};
/// use trenes::TrainStatus;
///
/// let now = NaiveDate::from_ymd_opt(2024, 3, 15)
///     .unwrap()
///     .and_hms_opt(9, 0, 0)
///     .unwrap();
/// let object = json!({
///     "tipo_s": "N", "est": 7, "estado": "EN ANDEN",
///     "and": "3", "min": "10:15", "ramal": 41
/// });
///
/// let DecodedEntry::Terminus(item) = decode_entry(&object, now).unwrap() else {
///     panic!("expected a terminus entry");
/// };
/// assert_eq!(item.status, TrainStatus::OnPlatform);
/// assert_eq!(item.platform, 3);
/// assert_eq!(item.timestamp.to_string(), "2024-03-15 10:15:00");
/// ```
pub fn decode_entry(value: &Value, now: NaiveDateTime) -> Result<DecodedEntry, DecodeError> {
    let fields = Fields::new(value)?;

    match decode_terminus(fields, now) {
        Ok(item) => Ok(DecodedEntry::Terminus(item)),
        Err(terminus) => decode_intermediate(fields, now)
            .map(DecodedEntry::Intermediate)
            .map_err(|intermediate| DecodeError::Unrecognized {
                terminus: Box::new(terminus),
                intermediate: Box::new(intermediate),
            }),
    }
}

/// [`decode_entry`] relative to the current local time.
pub fn decode_entry_now(value: &Value) -> Result<DecodedEntry, DecodeError> {
    decode_entry(value, Local::now().naive_local())
}

fn decode_terminus(fields: Fields<'_>, now: NaiveDateTime) -> Result<TerminusItem, DecodeError> {
    let service_type = service_type(fields, "tipo_s")?;
    let est = fields.value("est")?.clone();

    let status_text = fields.str("estado")?;
    let status = TrainStatus::parse(status_text)
        .ok_or_else(|| DecodeError::UnknownStatus(status_text.to_owned()))?;

    let platform = fields.integer("and")?;

    let time_text = fields.str("min")?;
    let time = NaiveTime::parse_from_str(time_text.trim(), "%H:%M")
        .map_err(|_| invalid_value("min", &Value::from(time_text)))?;

    // A bad line id never rejects a departure.
    let line_id = fields.integer("ramal").unwrap_or(UNKNOWN_LINE);

    Ok(TerminusItem {
        timestamp: now.date().and_time(time),
        service_type,
        line_id,
        est,
        platform,
        status,
    })
}

fn decode_intermediate(
    fields: Fields<'_>,
    now: NaiveDateTime,
) -> Result<Vec<IntermediateItem>, DecodeError> {
    INTERMEDIATE_SLOTS
        .map(|slot| {
            decode_slot(fields, slot, now).map_err(|e| DecodeError::Slot {
                slot,
                source: Box::new(e),
            })
        })
        .collect()
}

fn decode_slot(
    fields: Fields<'_>,
    slot: u8,
    now: NaiveDateTime,
) -> Result<IntermediateItem, DecodeError> {
    let key = |name: &str| format!("{name}_{slot}");

    let service_type = service_type(fields, &key("tipo_s"))?;
    let line_id = fields.integer(&key("ramal"))?;
    let est = fields.value(&key("est"))?.clone();

    let minutes_key = key("min");
    let minutes = fields.str(&minutes_key)?;
    let timestamp = minutes_from(now, minutes)
        .ok_or_else(|| invalid_value(&minutes_key, &Value::from(minutes)))?;

    let train_number = fields.str(&key("tren"))?.to_owned();
    let train_id = fields.str(&key("chapa"))?.to_owned();
    let passthrough_id = fields.value("_id")?.clone();

    Ok(IntermediateItem {
        timestamp,
        service_type,
        line_id,
        est,
        train_number,
        train_id,
        passthrough_id,
    })
}

fn service_type(fields: Fields<'_>, key: &str) -> Result<ServiceType, DecodeError> {
    let code = fields.str(key)?;
    ServiceType::from_code(code).ok_or_else(|| DecodeError::UnknownServiceType(code.to_owned()))
}

/// `now` plus a possibly fractional number of minutes.
fn minutes_from(now: NaiveDateTime, minutes: &str) -> Option<NaiveDateTime> {
    let minutes: f64 = minutes.trim().parse().ok().filter(|m: &f64| m.is_finite())?;
    let offset = TimeDelta::try_milliseconds((minutes * 60_000.0).round() as i64)?;
    now.checked_add_signed(offset)
}
