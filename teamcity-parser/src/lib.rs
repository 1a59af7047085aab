pub mod api;
pub mod changes;
pub mod classify;
pub mod config;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod pipeline;
pub mod prometheus;
pub mod router;
pub mod server;
pub mod sinks;
