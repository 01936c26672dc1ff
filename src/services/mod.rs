//! Service layer
//!
//! The event service plus its collaborators: Redis caching, time sources
//! and notification delivery.

pub mod cache;
pub mod clock;
pub mod event_service;
pub mod notifications;

pub use cache::RedisCache;
pub use clock::{Clock, ManualClock, RefreshingClock, SystemClock};
pub use event_service::{EventService, ServiceError, ServiceResult};
pub use notifications::{
    LogNotificationSink, NotificationSink, Notifier, PgNotificationSink, RecordingNotificationSink,
};
