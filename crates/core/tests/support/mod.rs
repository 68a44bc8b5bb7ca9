//! Shared test helpers for `flowsync-core` integration tests.
//!
//! In-memory fakes for the source and sink ports so orchestrator tests can
//! focus on behaviour instead of HTTP plumbing.

#![allow(dead_code)]

pub mod fakes;
