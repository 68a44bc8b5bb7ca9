//! External service integrations

pub mod airtable;
pub mod klaviyo;
