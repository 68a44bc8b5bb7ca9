//! Utility helpers for the entry surface

pub mod logging;
