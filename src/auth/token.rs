//! Token secrets and the persisted token state record.

pub mod secret;
pub mod state;
