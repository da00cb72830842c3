//! API endpoint handlers.
//!
//! Each module corresponds to one area of the route table. Handlers
//! open their own connection and delegate to the domain modules.

pub mod alerts;
pub mod auth;
pub mod checklist;
pub mod health;
pub mod indicators;
pub mod notifications;
pub mod reminders;
pub mod reports;
