//! Leasehold backend
//!
//! Scheduled property-management events (move-ins, work orders, tours,
//! inspections) whose role-assigned tasks unlock in dependency order and
//! leave completion stamps that lock at the end of the day.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;
