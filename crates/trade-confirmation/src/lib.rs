//! Entry and exit confirmation rules.

pub mod entry;
pub mod exit;

pub use entry::*;
pub use exit::*;
