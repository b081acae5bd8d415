//! Remote execution service interface

pub mod client;
pub mod types;

pub use client::{ApiClient, RunService};
