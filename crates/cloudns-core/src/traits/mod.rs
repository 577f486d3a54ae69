//! Core traits for cloudns-sync
//!
//! - [`RemoteZone`]: Record storage of the authoritative DNS provider

pub mod remote_zone;

pub use remote_zone::RemoteZone;
