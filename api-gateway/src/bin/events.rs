//! Events Lambda - CRUD for event records behind API Gateway.
//!
//! Endpoints:
//! - POST /events - Create an event, optionally scheduling a deferred status update
//! - GET /events/{eventId} - Read an event
//! - PUT /events/{eventId} - Replace an event in full
//! - DELETE /events/{eventId} - Delete an event
//!
//! The event id for GET/PUT/DELETE is taken from the path, then the query
//! string, then the `id` field of the body.

use lambda_http::{run, service_fn, Body, Error, Request, RequestExt, Response};
use serde::Serialize;
use shared::http::{error_response, json_response, parse_item};
use shared::models::record_id;
use shared::{
    fields, Config, DeferredUpdatePayload, DynamoRecordStore, Event, EventBridgeScheduler,
    FieldUpdate, FieldValue, Item, PriorityChain, RecordStore, Scheduler,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Path and query parameter names accepted for the event id (case-insensitive).
const ID_PARAM_KEYS: [&str; 2] = ["id", "eventId"];

/// Body key carrying an explicit field update for the scheduled callback.
const FIELD_UPDATE_KEY: &str = "fieldUpdate";

/// Application state shared across requests.
struct AppState {
    store: Box<dyn RecordStore>,
    scheduler: Option<Box<dyn Scheduler>>,
    require_entry_count: bool,
}

impl AppState {
    async fn new() -> Result<Self, Error> {
        let config = Config::from_env()?;
        let sdk_config = config.sdk_config().await;

        let store = DynamoRecordStore::new(
            aws_sdk_dynamodb::Client::new(&sdk_config),
            config.table_name.clone(),
        );

        let scheduler = config.schedule.clone().map(|schedule| {
            Box::new(EventBridgeScheduler::new(
                aws_sdk_scheduler::Client::new(&sdk_config),
                schedule,
            )) as Box<dyn Scheduler>
        });

        info!(
            table = %config.table_name,
            scheduling_enabled = scheduler.is_some(),
            require_entry_count = config.require_entry_count,
            "Events function configured"
        );

        Ok(Self {
            store: Box::new(store),
            scheduler,
            require_entry_count: config.require_entry_count,
        })
    }
}

#[derive(Debug, Serialize)]
struct ItemReply<'a> {
    message: &'static str,
    item: &'a Item,
}

#[derive(Debug, Serialize)]
struct DeletedReply {
    message: &'static str,
    id: String,
}

/// Result of trying to register the deferred update on create.
#[derive(Debug)]
enum ScheduleOutcome {
    Registered { scheduled_for: String },
    Failed { error: String },
}

impl ScheduleOutcome {
    /// Attach the outcome to the create response record.
    fn annotate(self, item: &mut Item) {
        match self {
            ScheduleOutcome::Registered { scheduled_for } => {
                item.insert(fields::SCHEDULE_CREATED.to_string(), true.into());
                item.insert(fields::SCHEDULED_FOR.to_string(), scheduled_for.into());
            }
            ScheduleOutcome::Failed { error } => {
                item.insert(fields::SCHEDULE_CREATED.to_string(), false.into());
                item.insert(fields::SCHEDULE_ERROR.to_string(), error.into());
            }
        }
    }
}

/// Places the event id can come from, in priority order.
struct IdSources {
    path: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Option<String>,
}

fn id_chain() -> PriorityChain<IdSources, String> {
    PriorityChain::new()
        .then("path", |sources: &IdSources| id_param(&sources.path))
        .then("query", |sources: &IdSources| id_param(&sources.query))
        .then("body", |sources: &IdSources| sources.body.clone())
}

fn id_param(params: &[(String, String)]) -> Option<String> {
    ID_PARAM_KEYS.iter().find_map(|key| {
        params
            .iter()
            .find(|(name, value)| name.eq_ignore_ascii_case(key) && !value.is_empty())
            .map(|(_, value)| value.clone())
    })
}

fn resolve_event_id(event: &Request, body: &Item) -> shared::Result<String> {
    let sources = IdSources {
        path: event
            .path_parameters()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        query: event
            .query_string_parameters()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        body: record_id(body).map(str::to_string),
    };

    let (source, id) = id_chain()
        .resolve(&sources)
        .ok_or_else(|| shared::Error::validation("event id is required"))?;

    debug!(event_id = %id, source, "Resolved event id");
    Ok(id)
}

/// Id resolution for requests whose body is only a fallback id source.
///
/// A malformed body is ignored when the path or query already names the event.
fn resolve_event_id_lenient(event: &Request) -> shared::Result<String> {
    match parse_item(event.body()) {
        Ok(body) => resolve_event_id(event, &body),
        Err(parse_error) => resolve_event_id(event, &Item::new()).map_err(|_| parse_error),
    }
}

/// Caller-supplied id on create. Numbers are kept as their decimal text;
/// absent, null or empty ids mean one gets generated.
fn requested_id(input: &Item) -> shared::Result<Option<String>> {
    match input.get(fields::ID) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(FieldValue::String(id)) if id.is_empty() => Ok(None),
        Some(FieldValue::String(id)) => Ok(Some(id.clone())),
        Some(FieldValue::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(shared::Error::validation("field id must be a string or number")),
    }
}

/// Optional `fieldUpdate` the scheduled callback should apply instead of the status.
fn requested_field_update(input: &Item) -> shared::Result<Option<FieldUpdate>> {
    let entries = match input.get(FIELD_UPDATE_KEY) {
        None | Some(FieldValue::Null) => return Ok(None),
        Some(FieldValue::Map(entries)) => entries,
        Some(_) => return Err(shared::Error::validation("fieldUpdate must be an object")),
    };

    let field = entries
        .get("field")
        .and_then(FieldValue::as_str)
        .filter(|field| !field.is_empty())
        .ok_or_else(|| shared::Error::validation("fieldUpdate.field must be a non-empty string"))?;

    if field == fields::ID {
        return Err(shared::Error::validation("the id field cannot be updated"));
    }

    let value = entries
        .get("value")
        .cloned()
        .ok_or_else(|| shared::Error::validation("fieldUpdate.value is required"))?;

    Ok(Some(FieldUpdate {
        field: field.to_string(),
        value,
    }))
}

async fn schedule_deferred_update(
    scheduler: &dyn Scheduler,
    event: &Event,
    payload: &DeferredUpdatePayload,
) -> ScheduleOutcome {
    let result = match serde_json::to_string(payload) {
        Ok(json) => scheduler.register_one_shot(&event.id, &event.date, &json).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(callback) => {
            info!(
                event_id = %event.id,
                schedule_name = %callback.name,
                expression = %callback.expression,
                "Scheduled deferred update"
            );
            ScheduleOutcome::Registered {
                scheduled_for: event.date.clone(),
            }
        }
        Err(e) => {
            warn!(event_id = %event.id, error = %e, "Failed to schedule deferred update; event kept");
            ScheduleOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

async fn create_event(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let input = parse_item(event.body())?;
    let field_update = requested_field_update(&input)?;

    let id = match requested_id(&input)? {
        Some(id) => id,
        None => Uuid::new_v4().to_string(),
    };
    let new_event = Event::from_input(id, &input, state.require_entry_count)?;

    let mut item = new_event.to_item();
    state.store.put(item.clone()).await?;
    info!(event_id = %new_event.id, "Created event");

    if let Some(scheduler) = &state.scheduler {
        let payload = DeferredUpdatePayload {
            record: item.clone(),
            field_update,
        };
        schedule_deferred_update(scheduler.as_ref(), &new_event, &payload)
            .await
            .annotate(&mut item);
    }

    json_response(
        201,
        &ItemReply {
            message: "created",
            item: &item,
        },
    )
}

async fn read_event(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let id = resolve_event_id_lenient(event)?;

    let item = state
        .store
        .get(&id)
        .await?
        .ok_or(shared::Error::NotFound(id))?;

    json_response(200, &item)
}

async fn replace_event(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let input = parse_item(event.body())?;
    let id = resolve_event_id(event, &input)?;

    let replacement = Event::from_input(id, &input, state.require_entry_count)?;
    let item = replacement.to_item();
    state.store.put(item.clone()).await?;
    info!(event_id = %replacement.id, "Replaced event");

    json_response(
        200,
        &ItemReply {
            message: "updated",
            item: &item,
        },
    )
}

async fn delete_event(state: &AppState, event: &Request) -> shared::Result<Response<Body>> {
    let id = resolve_event_id_lenient(event)?;

    state.store.delete(&id).await?;
    info!(event_id = %id, "Deleted event");

    json_response(
        200,
        &DeletedReply {
            message: "deleted",
            id,
        },
    )
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    let method = event.method().as_str().to_ascii_uppercase();
    info!(method = %method, path = %event.uri().path(), "Handling events request");

    let result = match method.as_str() {
        "POST" => create_event(&state, &event).await,
        "GET" => read_event(&state, &event).await,
        "PUT" => replace_event(&state, &event).await,
        "DELETE" => delete_event(&state, &event).await,
        other => Err(shared::Error::MethodNotAllowed(other.to_string())),
    };

    match result {
        Ok(response) => Ok(response),
        Err(e) => {
            if e.status_code() >= 500 {
                error!(method = %method, error = %e, "Events request failed");
            } else {
                warn!(method = %method, error = %e, "Events request rejected");
            }
            Ok(error_response(&e)?)
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
