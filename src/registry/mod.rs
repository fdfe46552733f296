//! Registries used by the encoder and decoder.
//!
//! - [`ClassRegistry`]: supplied by the caller, shared across calls.
//! - [`IdentityRegistry`]: created fresh for each encode pass.
//! - [`AddressTable`]: created fresh for each decode pass.

pub mod class;
pub mod identity;
pub mod address;

pub use class::ClassRegistry;
pub use identity::IdentityRegistry;
pub use address::AddressTable;
