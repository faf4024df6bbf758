//! Command implementations for ecudiag
//!
//! Each command returns whether everything it attempted succeeded; the
//! binary turns that into the exit status.

pub mod key;
pub mod ping;
pub mod send;

pub use key::key;
pub use ping::ping;
pub use send::{run, send};
