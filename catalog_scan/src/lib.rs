pub mod adapters;
pub mod configuration;
pub mod core;
pub mod error;
pub mod observability;
pub mod report;
