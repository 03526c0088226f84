//! Command implementations for bridge CLI.
//!
//! Each submodule implements the logic for one command.

pub mod doctor;
pub mod launch;
pub mod menu;
pub mod settings;
pub mod setup;
