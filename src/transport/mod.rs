//! # Transport
//!
//! Everything between a navigation step and the wire:
//!
//! - [`fetch`]: the [`Fetch`] seam and its reqwest implementation
//! - [`load`]: timeout race and status classification ([`Transport`])
//! - [`middleware`]: the per-client onion of [`Middleware`] layers
//! - [`stream`]: read-once JSON body helper
//! - [`types`]: [`RequestOptions`] and [`Response`]

pub mod fetch;
pub mod load;
pub mod middleware;
pub mod stream;
pub mod types;

pub use fetch::{Fetch, FetchError, ReqwestFetch};
pub use load::{LoadResult, Transport, TransportFailure};
pub use middleware::{Middleware, MiddlewareStack, Next};
pub use stream::safe_stream_json;
pub use types::{RequestOptions, Response};
