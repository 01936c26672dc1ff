//! Event template domain types
//!
//! Templates are read-only reference data. Events copy a template's tasks
//! when they are created and never refer back to it.

use serde::{Deserialize, Serialize};

use super::events::{EventCategory, EventPriority};
use super::roles::Role;

/// One default task in a template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskTemplate {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub assigned_role: Role,
    #[serde(default = "default_true")]
    pub is_required: bool,
    /// Keys of sibling task templates that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Due date relative to the event's scheduled instant
    #[serde(default)]
    pub due_offset_minutes: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// Catalog entry for an event type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventTemplate {
    /// Identifier, e.g. `move-in`
    pub id: String,
    pub name: String,
    pub category: EventCategory,
    #[serde(default)]
    pub default_priority: EventPriority,
    #[serde(default)]
    pub default_duration_minutes: Option<i32>,
    pub tasks: Vec<TaskTemplate>,
}

impl TaskTemplate {
    pub fn new(key: &str, title: &str, assigned_role: Role) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            description: None,
            assigned_role,
            is_required: true,
            depends_on: Vec::new(),
            due_offset_minutes: None,
        }
    }

    pub fn after(mut self, keys: &[&str]) -> Self {
        self.depends_on = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_required = false;
        self
    }

    pub fn due_in(mut self, minutes: i64) -> Self {
        self.due_offset_minutes = Some(minutes);
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
}
