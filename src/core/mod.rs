pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod formatter;
pub mod providers;
pub mod quota;
pub mod subject;
