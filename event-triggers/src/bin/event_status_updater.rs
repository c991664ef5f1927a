//! Event Status Updater Lambda - Applies a deferred field update when a schedule fires.
//!
//! Invoked by EventBridge Scheduler with the payload stored on the schedule:
//! `{ "record": { "id": ..., "status": ... }, "fieldUpdate"?: { "field": ..., "value": ... } }`.
//! The update only lands if the record still exists. Nobody consumes the
//! result, so every outcome is logged and returned as `{statusCode, body}`.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Serialize;
use serde_json::value::RawValue;
use shared::http::ErrorBody;
use shared::models::record_id;
use shared::{
    fields, Config, DeferredUpdatePayload, DynamoRecordStore, FieldUpdate, FieldValue, Item,
    PriorityChain, RecordStore,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

struct AppState {
    store: Box<dyn RecordStore>,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let sdk_config = config.sdk_config().await;

        let store = DynamoRecordStore::new(
            aws_sdk_dynamodb::Client::new(&sdk_config),
            config.table_name.clone(),
        );

        Ok(Self {
            store: Box::new(store),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationOutcome {
    status_code: u16,
    body: String,
}

impl InvocationOutcome {
    fn new<T: Serialize>(status_code: u16, body: &T) -> Result<Self, Error> {
        Ok(Self {
            status_code,
            body: serde_json::to_string(body)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct UpdatedReply<'a> {
    message: &'static str,
    item: &'a Item,
}

/// Which field to set: an explicit `fieldUpdate`, else the record's status.
fn update_chain() -> PriorityChain<DeferredUpdatePayload, FieldUpdate> {
    PriorityChain::new()
        .then("fieldUpdate", |payload: &DeferredUpdatePayload| {
            payload.field_update.clone()
        })
        .then("record.status", |payload: &DeferredUpdatePayload| {
            payload
                .record
                .get(fields::STATUS)
                .filter(|value| **value != FieldValue::Null)
                .map(|value| FieldUpdate {
                    field: fields::STATUS.to_string(),
                    value: value.clone(),
                })
        })
}

/// Accept the payload as an object or as a JSON string holding the object.
fn normalize_payload(raw: &RawValue) -> shared::Result<DeferredUpdatePayload> {
    let text = raw.get().trim_start();
    let parsed = if text.starts_with('"') {
        serde_json::from_str::<String>(text).and_then(|inner| serde_json::from_str(&inner))
    } else {
        serde_json::from_str(text)
    };

    parsed.map_err(|e| shared::Error::validation(format!("invalid deferred update payload: {}", e)))
}

async fn apply_deferred_update(store: &dyn RecordStore, raw: &RawValue) -> shared::Result<Item> {
    let payload = normalize_payload(raw)?;
    info!(payload = ?payload, "Normalized deferred update payload");

    let id = record_id(&payload.record)
        .ok_or_else(|| shared::Error::validation("record.id is required"))?
        .to_string();

    let (source, update) = update_chain().resolve(&payload).ok_or_else(|| {
        shared::Error::validation("no field to update: provide fieldUpdate or record.status")
    })?;

    if update.field.is_empty() {
        return Err(shared::Error::validation("fieldUpdate.field must not be empty"));
    }
    if update.field == fields::ID {
        return Err(shared::Error::validation("the id field cannot be updated"));
    }

    info!(event_id = %id, field = %update.field, source, "Applying deferred update");
    store.update_field(&id, &update.field, update.value).await
}

async fn handler(
    state: Arc<AppState>,
    event: LambdaEvent<Box<RawValue>>,
) -> Result<InvocationOutcome, Error> {
    let (payload, context) = event.into_parts();
    info!(request_id = %context.request_id, payload = %payload.get(), "Received deferred update");

    match apply_deferred_update(state.store.as_ref(), &payload).await {
        Ok(item) => {
            info!(event_id = ?record_id(&item), "Deferred update applied");
            InvocationOutcome::new(
                200,
                &UpdatedReply {
                    message: "updated",
                    item: &item,
                },
            )
        }
        Err(e) => {
            match e.status_code() {
                404 => warn!(error = %e, "Deferred update skipped: record no longer exists"),
                400 => warn!(error = %e, "Deferred update rejected"),
                _ => error!(error = %e, "Deferred update failed"),
            }
            InvocationOutcome::new(e.status_code(), &ErrorBody::from(&e))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let state = Arc::new(AppState::new().await?);

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lambda_runtime::Context;
    use shared::InMemoryRecordStore;

    /// Store whose backend is always unavailable.
    struct UnavailableStore;

    #[async_trait]
    impl RecordStore for UnavailableStore {
        async fn get(&self, _id: &str) -> shared::Result<Option<Item>> {
            Err(shared::Error::Store("service unavailable".to_string()))
        }

        async fn put(&self, _item: Item) -> shared::Result<()> {
            Err(shared::Error::Store("service unavailable".to_string()))
        }

        async fn update_field(
            &self,
            _id: &str,
            _field: &str,
            _value: FieldValue,
        ) -> shared::Result<Item> {
            Err(shared::Error::Store("service unavailable".to_string()))
        }

        async fn delete(&self, _id: &str) -> shared::Result<()> {
            Err(shared::Error::Store("service unavailable".to_string()))
        }
    }

    const E1: &str = r#"{"id":"E1","name":"Concert","date":"2025-11-01T20:00:00Z","status":"OnSale","city":"Lima"}"#;

    fn seeded_store() -> InMemoryRecordStore {
        let item: Item = serde_json::from_str(E1).unwrap();
        InMemoryRecordStore::with_records([item]).unwrap()
    }

    fn state_with(store: Box<dyn RecordStore>) -> Arc<AppState> {
        Arc::new(AppState { store })
    }

    fn invocation(payload: &str) -> LambdaEvent<Box<RawValue>> {
        LambdaEvent::new(
            RawValue::from_string(payload.to_string()).unwrap(),
            Context::default(),
        )
    }

    fn body_json(outcome: &InvocationOutcome) -> serde_json::Value {
        serde_json::from_str(&outcome.body).unwrap()
    }

    #[tokio::test]
    async fn test_status_update_leaves_other_fields() {
        let store = seeded_store();
        let state = state_with(Box::new(store.clone()));

        let outcome = handler(state, invocation(r#"{"record":{"id":"E1","status":"SoldOut"}}"#))
            .await
            .unwrap();
        assert_eq!(outcome.status_code, 200);

        let mut expected: Item = serde_json::from_str(E1).unwrap();
        expected.insert("status".to_string(), "SoldOut".into());
        assert_eq!(store.get("E1").await.unwrap().unwrap(), expected);
        assert_eq!(body_json(&outcome)["item"]["status"], "SoldOut");
    }

    #[tokio::test]
    async fn test_missing_record_is_not_written() {
        let store = InMemoryRecordStore::new();
        let state = state_with(Box::new(store.clone()));

        let outcome = handler(state, invocation(r#"{"record":{"id":"E404","status":"SoldOut"}}"#))
            .await
            .unwrap();

        assert_eq!(outcome.status_code, 404);
        assert_eq!(body_json(&outcome)["id"], "E404");
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_explicit_field_update_wins_over_status() {
        let store = seeded_store();
        let state = state_with(Box::new(store.clone()));

        let payload = r#"{"record":{"id":"E1","status":"SoldOut"},"fieldUpdate":{"field":"city","value":"Arequipa"}}"#;
        let outcome = handler(state, invocation(payload)).await.unwrap();
        assert_eq!(outcome.status_code, 200);

        let stored = store.get("E1").await.unwrap().unwrap();
        assert_eq!(stored["city"], FieldValue::from("Arequipa"));
        assert_eq!(stored["status"], FieldValue::from("OnSale"));
    }

    #[tokio::test]
    async fn test_numbers_keep_exact_decimal_text() {
        let store = seeded_store();
        let state = state_with(Box::new(store.clone()));

        let payload = r#"{"record":{"id":"E1"},"fieldUpdate":{"field":"entryCount","value":3.10}}"#;
        let outcome = handler(state, invocation(payload)).await.unwrap();
        assert_eq!(outcome.status_code, 200);
        assert!(outcome.body.contains(r#""entryCount":3.10"#));

        let stored = store.get("E1").await.unwrap().unwrap();
        assert_eq!(stored["entryCount"].as_number().unwrap().to_string(), "3.10");
    }

    #[tokio::test]
    async fn test_string_encoded_payload_is_normalized() {
        let store = seeded_store();
        let state = state_with(Box::new(store.clone()));

        let inner = r#"{"record":{"id":"E1","status":"Cancelled"}}"#;
        let encoded = serde_json::to_string(inner).unwrap();
        let outcome = handler(state, invocation(&encoded)).await.unwrap();

        assert_eq!(outcome.status_code, 200);
        let stored = store.get("E1").await.unwrap().unwrap();
        assert_eq!(stored["status"], FieldValue::from("Cancelled"));
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let cases = [
            r#"{"record":{"status":"SoldOut"}}"#,
            r#"{"record":{"id":"E1"}}"#,
            r#"{"record":{"id":"E1"},"fieldUpdate":{"field":"id","value":"E2"}}"#,
            r#"{"fieldUpdate":{"field":"status","value":"SoldOut"}}"#,
            r#"[1,2,3]"#,
        ];

        for payload in cases {
            let store = seeded_store();
            let state = state_with(Box::new(store.clone()));

            let outcome = handler(state, invocation(payload)).await.unwrap();
            assert_eq!(outcome.status_code, 400, "payload {}", payload);
            assert_eq!(
                store.get("E1").await.unwrap().unwrap(),
                serde_json::from_str::<Item>(E1).unwrap()
            );
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let state = state_with(Box::new(UnavailableStore));

        let outcome = handler(state, invocation(r#"{"record":{"id":"E1","status":"SoldOut"}}"#))
            .await
            .unwrap();

        assert_eq!(outcome.status_code, 500);
        assert_eq!(body_json(&outcome)["message"], "Store error: service unavailable");
    }
}
