//! webpify - watch a directory tree and convert new images to WebP
//!
//! This library crate exposes the pipeline for the binary and for
//! integration testing.

pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod formats;
pub mod pool;
pub mod queue;
pub mod watch;
