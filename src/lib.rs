//! Fetches per-country u-rate gap tables, parses and normalises them, and
//! projects them into renderer-independent chart descriptions.

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod projection;
