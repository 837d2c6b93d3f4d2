//! Live face identity matching against an enrolled gallery.

pub mod annotate;
pub mod camera;
pub mod config;
pub mod db;
pub mod display;
pub mod error;
pub mod export;
pub mod faces;
pub mod logging;
pub mod session;
