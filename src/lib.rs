//! halnav: a client-side navigation engine for HAL hypermedia APIs.
//!
//! Start from a [`Client`], fetch the homepage, then follow links and
//! submit forms by name:
//!
//! ```no_run
//! # async fn run() -> Result<(), halnav::Error> {
//! use halnav::{Client, ClientOptions, RequestOptions};
//! use serde_json::json;
//!
//! let client = Client::new("https://api.example.com/", ClientOptions::default());
//! let home = client.fetch().await?;
//! if let Some(root) = home.resource() {
//!     let search = root.first_action("search", &json!({"q": "pens"}));
//!     let results = search.fetch(RequestOptions::new()).await?;
//!     println!("{:?}", results.data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod core;
pub mod error;
pub mod hal;
mod session;
pub mod transport;

#[cfg(test)]
pub mod test_support;

pub use client::Client;
pub use crate::core::config::{ClientOptions, XhrOptions};
pub use error::{Error, ErrorCode};
pub use hal::{Action, ActionKind, Data, Embedded, FetchResult, Payload, Resource};
pub use transport::{Middleware, Next, RequestOptions, Response, safe_stream_json};
