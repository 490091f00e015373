pub mod decoding;
pub mod historical;
