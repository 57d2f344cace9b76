//! Core library for steep, a tmux plugin manager.
//!
//! Everything lives under one root directory (`~/.steep` by default):
//! git working copies in `plugins/`, the JSON registry plus its lock
//! marker, and plugin definition files. [`engine::Engine`] drives the
//! lifecycle operations; [`resolver`] holds the pure version-selection
//! rules; [`storage`] owns locking and atomic persistence.

pub mod config;
pub mod definitions;
pub mod engine;
pub mod error;
pub mod git;
pub mod migrate;
pub mod registry;
pub mod resolver;
pub mod sourcer;
pub mod storage;
pub mod vcs;
pub mod workers;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
