//! Identifier generation and the identifier byte codec

pub mod codec;
pub mod generator;

pub use codec::DecodedId;
pub use generator::IdGenerator;
