//! # Core Utilities
//!
//! The leaf layer of halnav. Nothing in here touches the network.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CLIENT          │
//!                    └───────────┬─────────────┘
//!                                │
//!                    ┌───────────▼─────────────┐
//!                    │   HAL (resource/action) │
//!                    └───────────┬─────────────┘
//!                                │
//!                    ┌───────────▼─────────────┐
//!                    │  TRANSPORT (middleware, │
//!                    │   timeout, status)      │
//!                    └───────────┬─────────────┘
//!                                │
//!     ┌────────────┬─────────────┼──────────────┐
//!     ▼            ▼             ▼              ▼
//! ┌────────┐  ┌─────────┐  ┌──────────┐  ┌──────────┐
//! │ config │  │  merge  │  │ template │  │   urls   │
//! └────────┘  └─────────┘  └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: option structs, defaults, the config file and the
//!   body-less / reserved-key predicates
//! - [`merge`]: deep merge over a dynamic option tree
//! - [`template`]: RFC 6570 URI template expansion
//! - [`urls`]: URL joining and form serialization

pub mod config;
pub mod merge;
pub mod template;
pub mod urls;
