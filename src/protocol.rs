//! Protocol event shapes
//!
//! Events as they arrive from (or are recorded by) the homeserver. Only the
//! base fields are modelled; `content` stays untyped.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A list of events, as delivered in one transaction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Base fields shared by all events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "event_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub content: Value,
    #[serde(rename = "user_id", alias = "sender")]
    pub sender: String,
    pub room_id: String,
    #[serde(default)]
    pub origin_server_ts: i64,
    #[serde(default)]
    pub age: i64,
}

impl EventList {
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }
}
