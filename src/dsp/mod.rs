//! # DSP (Digital Signal Processing) Primitives
//!
//! This module contains the domain logic of the plugin:
//!
//! - **`delay_engine`**: a block-wise circular delay buffer, one row per
//!   audio channel, that mixes each incoming block into its history with
//!   a fixed feedback gain and handles wraparound at the row boundary.
//!   Everything else in the crate is host plumbing around it.

pub mod delay_engine;
