//! Configuration module.
//!
//! This module provides functionality for loading, overriding, and
//! persisting the settings of a check run.

pub mod loader;

pub use loader::{parse_port_list, CheckSettings, ConfigLoader, SettingsOverrides};
