//! Outbound HTTP plumbing shared by every integration

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};
