//! Route handlers, grouped by who may call them.

pub mod admin;
pub mod auth;
pub mod student;
