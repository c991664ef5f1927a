//! Event data model shared by the CRUD and deferred update functions.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;

use crate::decimal::ExactDecimal;
use crate::{Error, Result};

/// Attribute names used on stored event records.
pub mod fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const DATE: &str = "date";
    pub const STATUS: &str = "status";
    pub const CITY: &str = "city";
    pub const ENTRY_COUNT: &str = "entryCount";
    pub const SCHEDULE_CREATED: &str = "scheduleCreated";
    pub const SCHEDULED_FOR: &str = "scheduledFor";
    pub const SCHEDULE_ERROR: &str = "scheduleError";
}

/// A stored record: attribute name to value. Always carries `id`.
pub type Item = BTreeMap<String, FieldValue>;

/// Value of a single record attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(ExactDecimal),
    String(String),
    List(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<ExactDecimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Parse a value from its JSON source text, keeping numbers exact.
    pub fn from_raw(raw: &RawValue) -> serde_json::Result<Self> {
        let text = raw.get().trim_start();
        let value = match text.as_bytes().first() {
            Some(b'{') => FieldValue::Map(serde_json::from_str(text)?),
            Some(b'[') => FieldValue::List(serde_json::from_str(text)?),
            Some(b'"') => FieldValue::String(serde_json::from_str(text)?),
            Some(b't') | Some(b'f') => FieldValue::Bool(serde_json::from_str(text)?),
            Some(b'n') => FieldValue::Null,
            _ => FieldValue::Number(
                text.parse()
                    .map_err(<serde_json::Error as serde::de::Error>::custom)?,
            ),
        };
        Ok(value)
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        FieldValue::from_raw(&raw).map_err(<D::Error as serde::de::Error>::custom)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<ExactDecimal> for FieldValue {
    fn from(value: ExactDecimal) -> Self {
        FieldValue::Number(value)
    }
}

/// The non-empty string id carried by a record, if any.
pub fn record_id(item: &Item) -> Option<&str> {
    item.get(fields::ID)
        .and_then(FieldValue::as_str)
        .filter(|id| !id.is_empty())
}

/// A validated event record.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: String,
    pub name: String,
    pub date: String,
    pub status: String,
    pub city: String,
    pub entry_count: Option<ExactDecimal>,
}

impl Event {
    /// Build an event from request input, checking required fields in order.
    ///
    /// The first missing field is reported. Keys other than the event fields
    /// are ignored.
    pub fn from_input(id: String, input: &Item, require_entry_count: bool) -> Result<Self> {
        let required_str = |field: &str| -> Result<String> {
            match input.get(field) {
                None | Some(FieldValue::Null) => {
                    Err(Error::validation(format!("missing required field: {}", field)))
                }
                Some(FieldValue::String(value)) => Ok(value.clone()),
                Some(_) => Err(Error::validation(format!("field {} must be a string", field))),
            }
        };

        let name = required_str(fields::NAME)?;
        let date = required_str(fields::DATE)?;
        let status = required_str(fields::STATUS)?;
        let city = required_str(fields::CITY)?;

        let entry_count = match input.get(fields::ENTRY_COUNT) {
            None | Some(FieldValue::Null) if require_entry_count => {
                return Err(Error::validation(format!(
                    "missing required field: {}",
                    fields::ENTRY_COUNT
                )))
            }
            None | Some(FieldValue::Null) => None,
            Some(FieldValue::Number(n)) => Some(*n),
            Some(_) => {
                return Err(Error::validation(format!(
                    "field {} must be a number",
                    fields::ENTRY_COUNT
                )))
            }
        };

        Ok(Self {
            id,
            name,
            date,
            status,
            city,
            entry_count,
        })
    }

    /// The full record as written to the store.
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(fields::ID.to_string(), self.id.as_str().into());
        item.insert(fields::NAME.to_string(), self.name.as_str().into());
        item.insert(fields::DATE.to_string(), self.date.as_str().into());
        item.insert(fields::STATUS.to_string(), self.status.as_str().into());
        item.insert(fields::CITY.to_string(), self.city.as_str().into());
        if let Some(count) = self.entry_count {
            item.insert(fields::ENTRY_COUNT.to_string(), count.into());
        }
        item
    }
}

/// Single field assignment applied when a scheduled callback fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    pub value: FieldValue,
}

/// Input of the deferred update function, as stored on the schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredUpdatePayload {
    #[serde(default)]
    pub record: Item,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_update: Option<FieldUpdate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: &str) -> Item {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_field_values_keep_number_text() {
        let parsed = item(r#"{"id":"E1","price":3.10,"tags":["a",1.50],"meta":{"open":true,"note":null}}"#);
        assert_eq!(parsed["price"].as_number().unwrap().to_string(), "3.10");
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"id":"E1","meta":{"note":null,"open":true},"price":3.10,"tags":["a",1.50]}"#
        );
    }

    #[test]
    fn test_event_from_complete_input() {
        let input = item(r#"{"name":"Concert","date":"2025-11-01T20:00:00Z","status":"OnSale","city":"Lima","extra":"ignored"}"#);
        let event = Event::from_input("E1".to_string(), &input, false).unwrap();

        assert_eq!(event.name, "Concert");
        assert_eq!(event.city, "Lima");
        assert_eq!(event.entry_count, None);

        let stored = event.to_item();
        assert_eq!(stored.len(), 5);
        assert!(!stored.contains_key("extra"));
        assert_eq!(record_id(&stored), Some("E1"));
    }

    #[test]
    fn test_event_reports_first_missing_field() {
        let input = item(r#"{"name":"Concert","city":"Lima"}"#);
        let err = Event::from_input("E1".to_string(), &input, false).unwrap_err();
        assert!(err.to_string().contains("missing required field: date"));
    }

    #[test]
    fn test_event_rejects_non_string_field() {
        let input = item(r#"{"name":7,"date":"d","status":"s","city":"c"}"#);
        let err = Event::from_input("E1".to_string(), &input, false).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_entry_count_variant() {
        let input = item(r#"{"name":"n","date":"d","status":"s","city":"c"}"#);
        let err = Event::from_input("E1".to_string(), &input, true).unwrap_err();
        assert!(err.to_string().contains("missing required field: entryCount"));

        let input = item(r#"{"name":"n","date":"d","status":"s","city":"c","entryCount":120}"#);
        let event = Event::from_input("E1".to_string(), &input, true).unwrap();
        assert_eq!(event.entry_count, Some(ExactDecimal::from(120)));
    }

    #[test]
    fn test_deferred_payload_shape() {
        let payload: DeferredUpdatePayload = serde_json::from_str(
            r#"{"record":{"id":"E1","status":"SoldOut"},"fieldUpdate":{"field":"entryCount","value":3.10}}"#,
        )
        .unwrap();

        assert_eq!(record_id(&payload.record), Some("E1"));
        let update = payload.field_update.unwrap();
        assert_eq!(update.field, "entryCount");
        assert_eq!(update.value.as_number().unwrap().to_string(), "3.10");

        let bare: DeferredUpdatePayload = serde_json::from_str("{}").unwrap();
        assert!(bare.record.is_empty());
        assert!(bare.field_update.is_none());
    }
}
