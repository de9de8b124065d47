//! # Sightline Client
//!
//! [`ClientSession`] talks to one replica at a time on behalf of a camera
//! operator or a query user. It keeps the client's observed vector clock,
//! fails over to another replica when the bound one becomes unreachable and
//! keeps reads monotonic through a bounded [`ResponseCache`].

#![forbid(unsafe_code)]

pub mod cache;
pub mod session;

pub use cache::{CachedResponse, QuerySignature, ResponseCache};
pub use session::{ClientSession, SessionConfig};
