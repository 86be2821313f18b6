//! Observability for the mapping layer
//!
//! Structured JSON logging of declaration and registration events.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. No side effects on model definitions
//! 3. No async or background threads
//!
//! # Usage
//!
//! ```ignore
//! use aeromodel::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::ModelRegistered, &[("model", "User")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
