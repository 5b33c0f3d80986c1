//! Core of retarget-rs: converts streams of 3D pose landmarks into bone-local
//! rotation tracks and re-expresses those tracks on arbitrary rigged
//! skeletons.
//!
//! The pipeline, in dependency order:
//! - [`common::landmarks`] - landmark stream types and the static joint
//!   descriptor table
//! - [`capture`] - source skeleton synthesis and landmark-to-rotation
//!   conversion
//! - [`common::skeleton`] - skeleton arena and bind-pose world transform
//!   resolution
//! - [`retarget`] - name-based skeleton correspondence and the per-frame
//!   retargeting engine

pub mod capture;
pub mod common;
pub mod retarget;
