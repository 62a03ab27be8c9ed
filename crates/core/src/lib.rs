#![forbid(unsafe_code)]

//! Domain model for the SURGE reflective-chat platform: identities, chat
//! sessions, SSI scores, and the module/chapter catalog. No I/O lives here.

pub mod error;
pub mod model;
pub mod time;

pub use error::Error;
pub use time::Clock;
