pub mod challenge;
pub mod complete;
pub mod config;
pub mod snapshot;
pub mod user;
pub mod visible;
