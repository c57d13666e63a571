//! slotburst-core — shared types for the slotburst capacity controller.
//!
//! Holds the pieces every other crate agrees on:
//!
//! - Domain types: [`Scope`], [`Grant`], [`BudgetRequest`], [`ReversalTask`]
//! - The caller-visible error taxonomy, [`CapacityError`]
//! - The pure budget calculation, [`allowed_increment`]
//! - Configuration parsing and validation, [`BurstConfig`] → [`Settings`]

pub mod budget;
pub mod config;
pub mod error;
pub mod types;

pub use budget::allowed_increment;
pub use config::{BurstConfig, ConfigError, Settings};
pub use error::{CapacityError, CapacityResult};
pub use types::*;
