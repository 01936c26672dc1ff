//! HTTP middleware

pub mod request_id;

pub use request_id::{request_id_layer, X_REQUEST_ID};

/// Upper bound on JSON request bodies
pub const MAX_BODY_BYTES: usize = 64 * 1024;
