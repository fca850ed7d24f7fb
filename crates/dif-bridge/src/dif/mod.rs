//! The DIF interchange format spoken with the foreign runtime

pub mod core;
pub mod definitions;
pub mod display;

pub use definitions::*;
pub use display::address_to_display_string;
