//! Common error and result plumbing shared by the Obelisk crates.

pub mod error;

pub use error::{Error, ErrorKind, Result};
