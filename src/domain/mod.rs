//! Domain types and DTOs
//!
//! These types define the data structures for calendar events, their tasks,
//! templates and the roles acting on them.

pub mod events;
pub mod notifications;
pub mod roles;
pub mod tasks;
pub mod templates;

// Re-export commonly used types
pub use events::*;
pub use roles::{Capability, Role};
pub use tasks::*;
pub use templates::*;
