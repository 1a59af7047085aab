pub mod metrics;
pub mod warehouse;
