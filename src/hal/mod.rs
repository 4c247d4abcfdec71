//! # HAL
//!
//! The hypermedia graph a client walks:
//!
//! - [`resource`]: fetched documents and their embedded entries
//! - [`action`]: links and forms, their URL resolution and execution
//! - [`result`]: what a navigation step hands back

pub mod action;
pub mod resource;
pub mod result;

pub use action::{Action, ActionKind, Curie, Payload};
pub use resource::{ActionList, Embedded, Resource};
pub use result::{Data, FetchResult};
