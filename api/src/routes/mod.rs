//! Route handlers.

pub mod health;
pub mod observer;
pub mod signal;
