//! Postgres-backed event store (`calendar_events` table)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    EventPatch, EventStore, LoadedEvent, StoreChange, StoreError, StoreObservers, StoreResult,
};
use crate::domain::{
    Cancellation, EventCategory, EventFilter, EventPriority, EventStatus, EventTask, FollowUp,
    UniversalEvent,
};

const EVENT_COLUMNS: &str = r#"
    id, event_type, title, description, scheduled_at, duration_minutes, status,
    priority, category, tasks, assigned_users, property_id, unit_id, metadata,
    rescheduled_count, follow_ups, cancellation, created_by, created_at, updated_at
"#;

/// Database row for calendar event
#[derive(Debug, sqlx::FromRow)]
struct CalendarEventRow {
    id: Uuid,
    event_type: String,
    title: String,
    description: Option<String>,
    scheduled_at: DateTime<Utc>,
    duration_minutes: Option<i32>,
    status: String,
    priority: String,
    category: String,
    tasks: serde_json::Value,
    assigned_users: Vec<Uuid>,
    property_id: Option<Uuid>,
    unit_id: Option<Uuid>,
    metadata: serde_json::Value,
    rescheduled_count: i32,
    follow_ups: serde_json::Value,
    cancellation: Option<serde_json::Value>,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn parse_label<T: DeserializeOwned>(field: &str, raw: &str) -> StoreResult<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| StoreError::Malformed(format!("invalid {field} '{raw}'")))
}

/// Parse a JSON array element by element, dropping malformed entries.
/// Returns the parsed entries and how many were dropped.
fn parse_list<T: DeserializeOwned>(
    event_id: Uuid,
    field: &str,
    value: serde_json::Value,
) -> (Vec<T>, usize) {
    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Null => return (Vec::new(), 0),
        other => {
            tracing::warn!(event_id = %event_id, field, value = %other, "Expected a JSON array");
            return (Vec::new(), 1);
        }
    };
    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(event_id = %event_id, field, error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect();
    let dropped = total - parsed.len();
    (parsed, dropped)
}

impl TryFrom<CalendarEventRow> for UniversalEvent {
    type Error = StoreError;

    fn try_from(row: CalendarEventRow) -> Result<Self, Self::Error> {
        LoadedEvent::try_from(row).map(|loaded| loaded.event)
    }
}

impl TryFrom<CalendarEventRow> for LoadedEvent {
    type Error = StoreError;

    fn try_from(row: CalendarEventRow) -> Result<Self, Self::Error> {
        let status = match parse_label::<EventStatus>("status", &row.status)? {
            // Overdue is derived at read time; older rows may still carry it.
            EventStatus::Overdue => EventStatus::Scheduled,
            status => status,
        };
        let priority: EventPriority = parse_label("priority", &row.priority)?;
        let category: EventCategory = parse_label("category", &row.category)?;
        let (tasks, dropped_tasks): (Vec<EventTask>, usize) = parse_list(row.id, "tasks", row.tasks);
        let (follow_ups, dropped_follow_ups): (Vec<FollowUp>, usize) =
            parse_list(row.id, "follow_ups", row.follow_ups);
        let cancellation = match row.cancellation {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<Cancellation>(value)
                    .map_err(|e| StoreError::Malformed(format!("cancellation: {e}")))?,
            ),
        };

        let event = UniversalEvent {
            id: row.id,
            event_type: row.event_type,
            title: row.title,
            description: row.description,
            scheduled_at: row.scheduled_at,
            duration_minutes: row.duration_minutes,
            status,
            priority,
            category,
            tasks,
            assigned_users: row.assigned_users,
            property_id: row.property_id,
            unit_id: row.unit_id,
            metadata: row.metadata,
            rescheduled_count: row.rescheduled_count.max(0) as u32,
            follow_ups,
            cancellation,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        Ok(Self {
            event,
            dropped_entries: dropped_tasks + dropped_follow_ups,
        })
    }
}

fn label<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn decode_row(row: CalendarEventRow) -> StoreResult<UniversalEvent> {
    decode_loaded(row).map(|loaded| loaded.event)
}

fn decode_loaded(row: CalendarEventRow) -> StoreResult<LoadedEvent> {
    let id = row.id;
    LoadedEvent::try_from(row).map_err(|e| {
        tracing::warn!(event_id = %id, error = %e, "Malformed calendar event row");
        e
    })
}

pub struct PgEventStore {
    pool: PgPool,
    observers: StoreObservers,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            observers: StoreObservers::new(),
        }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }

    fn observers(&self) -> &StoreObservers {
        &self.observers
    }

    async fn fetch(&self, filter: &EventFilter) -> StoreResult<Vec<UniversalEvent>> {
        let status = filter.status.as_ref().map(label);
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM calendar_events
            WHERE ($1::uuid IS NULL OR property_id = $1)
            AND ($2::text IS NULL OR event_type = $2)
            AND ($3::text IS NULL OR status = $3)
            AND ($4::timestamptz IS NULL OR scheduled_at >= $4)
            AND ($5::timestamptz IS NULL OR scheduled_at < $5)
            AND ($6::uuid IS NULL OR created_by = $6 OR $6 = ANY(assigned_users))
            ORDER BY scheduled_at ASC, id ASC
            "#
        );

        let rows = sqlx::query_as::<_, CalendarEventRow>(&sql)
            .bind(filter.property_id)
            .bind(&filter.event_type)
            .bind(status)
            .bind(filter.from)
            .bind(filter.to)
            .bind(filter.assigned_user)
            .fetch_all(&self.pool)
            .await?;

        // Malformed rows are logged in decode_row and left out.
        Ok(rows.into_iter().filter_map(|row| decode_row(row).ok()).collect())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<UniversalEvent>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = $1");
        let row = sqlx::query_as::<_, CalendarEventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(decode_row(row).ok()),
            None => Ok(None),
        }
    }

    async fn get_for_update(&self, id: Uuid) -> StoreResult<Option<LoadedEvent>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = $1");
        let row = sqlx::query_as::<_, CalendarEventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        // Unlike reads, a row that cannot be decoded at all is an error here
        row.map(decode_loaded).transpose()
    }

    async fn insert(&self, event: &UniversalEvent) -> StoreResult<UniversalEvent> {
        let sql = format!(
            r#"
            INSERT INTO calendar_events (
                id, event_type, title, description, scheduled_at, duration_minutes, status,
                priority, category, tasks, assigned_users, property_id, unit_id, metadata,
                rescheduled_count, follow_ups, cancellation, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            RETURNING {EVENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CalendarEventRow>(&sql)
            .bind(event.id)
            .bind(&event.event_type)
            .bind(&event.title)
            .bind(&event.description)
            .bind(event.scheduled_at)
            .bind(event.duration_minutes)
            .bind(label(&event.status))
            .bind(label(&event.priority))
            .bind(label(&event.category))
            .bind(Json(&event.tasks))
            .bind(&event.assigned_users)
            .bind(event.property_id)
            .bind(event.unit_id)
            .bind(&event.metadata)
            .bind(event.rescheduled_count as i32)
            .bind(Json(&event.follow_ups))
            .bind(event.cancellation.as_ref().map(Json))
            .bind(event.created_by)
            .bind(event.created_at)
            .bind(event.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return StoreError::Conflict(event.id);
                    }
                }
                StoreError::Database(e)
            })?;

        let stored = decode_row(row)?;
        self.observers.publish(&StoreChange::Inserted(stored.clone()));
        Ok(stored)
    }

    async fn update(&self, id: Uuid, patch: &EventPatch) -> StoreResult<UniversalEvent> {
        let sql = format!(
            r#"
            UPDATE calendar_events SET
                status = $2,
                scheduled_at = $3,
                duration_minutes = $4,
                tasks = $5,
                follow_ups = $6,
                cancellation = $7,
                rescheduled_count = $8,
                updated_at = $9
            WHERE id = $1
            RETURNING {EVENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, CalendarEventRow>(&sql)
            .bind(id)
            .bind(label(&patch.status))
            .bind(patch.scheduled_at)
            .bind(patch.duration_minutes)
            .bind(Json(&patch.tasks))
            .bind(Json(&patch.follow_ups))
            .bind(patch.cancellation.as_ref().map(Json))
            .bind(patch.rescheduled_count as i32)
            .bind(patch.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))?;

        let stored = decode_row(row)?;
        self.observers.publish(&StoreChange::Updated(stored.clone()));
        Ok(stored)
    }

    async fn health_check(&self) -> bool {
        crate::db::health_check(&self.pool).await
    }
}
