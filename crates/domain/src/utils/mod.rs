//! Pure helper functions shared by domain types

pub mod text;
