//! Core types and trait definitions for the FaceMark attendance tracker.
//!
//! This crate is free of HTTP, mail, and database dependencies. Storage
//! backends implement [`store::AttendanceStore`]; mail transports implement
//! [`notify::Notifier`].

pub mod attendance;
pub mod error;
pub mod identity;
pub mod notify;
pub mod policy;
pub mod store;

pub use error::{Error, Result};
