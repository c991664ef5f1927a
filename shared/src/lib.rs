//! Shared library for the event Lambda functions.
//!
//! This crate provides the event model, the record store and scheduler clients,
//! configuration and error types used by both the CRUD and deferred update functions.

pub mod config;
pub mod decimal;
pub mod dynamo;
pub mod error;
pub mod http;
pub mod memory_store;
pub mod models;
pub mod resolve;
pub mod scheduler;
pub mod store;

pub use config::{Config, ScheduleConfig};
pub use decimal::ExactDecimal;
pub use dynamo::DynamoRecordStore;
pub use error::{Error, Result};
pub use memory_store::InMemoryRecordStore;
pub use models::{fields, DeferredUpdatePayload, Event, FieldUpdate, FieldValue, Item};
pub use resolve::PriorityChain;
pub use scheduler::{EventBridgeScheduler, ScheduledCallback, Scheduler};
pub use store::RecordStore;
