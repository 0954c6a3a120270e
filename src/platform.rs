//! Platform metadata and error classification shared by all flows.

pub mod descriptor;
pub mod strategy;

pub use descriptor::*;
pub use strategy::*;
