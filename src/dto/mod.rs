//! Wire-facing data transfer objects.

pub mod health;
pub mod ws;
