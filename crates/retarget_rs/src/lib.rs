#![deny(missing_docs)]
//! ## Crate Items Overview
//!
//! retarget-rs converts streams of 3D pose landmarks into skeletal animation
//! and re-expresses that animation on arbitrary rigged characters.
//!
//! ### Modules
//! - [`retarget_core`](crate::retarget_core) - landmark types, skeleton
//!   arena, rotation conversion and the retargeting engine.
//! - [`retarget_utils`](crate::retarget_utils) - numerical and vector
//!   helpers.
//!
//! ### Typical flow
//! Build a source skeleton and motion track from a captured landmark clip
//! with `capture::builder::convert_clip`, then construct a
//! `retarget::engine::RetargetingContext` against a rigged target skeleton
//! and map the track frame by frame with `retarget_track`.
pub use retarget_core;
pub use retarget_utils;
