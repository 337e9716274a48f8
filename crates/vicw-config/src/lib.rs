// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the VICW context engine.
//!
//! Layered TOML + environment loading via Figment, strict models that
//! reject unknown keys, and threshold validation for the pressure loop.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::VicwConfig;
