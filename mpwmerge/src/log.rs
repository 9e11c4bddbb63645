//! Logging macros for the crate.
//!
//! Unit tests print straight to stdout so that records show up in
//! `cargo test` output without installing a logger.

#[cfg(test)]
#[allow(unused_imports)]
pub(crate) use std::{println as debug, println as info, println as warn, println as error};

#[cfg(not(test))]
#[allow(unused_imports)]
pub(crate) use log::{debug, error, info, warn};

/// A record that knows how to emit itself through the logging facade.
pub trait Log {
    fn log(&self);
}

impl<T: Log> Log for [T] {
    fn log(&self) {
        for item in self {
            item.log();
        }
    }
}
