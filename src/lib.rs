#[cfg(test)]
#[macro_use]
extern crate assert_matches;
extern crate byteorder;
#[macro_use]
extern crate log;
extern crate rand;

pub mod core;

#[derive(Debug)]
pub enum Error {
    /// Indicates an error where a buffer was too small or too large.
    Exhausted,
    /// Indicates an error where a packet or frame is malformed.
    Malformed,
    /// Indicates an error where a checksum is invalid.
    Checksum,
    /// Indicates traffic that was deliberately not acted on.
    Ignored,
    /// Indicates an error raised by the underlying frame transport.
    Device(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
