//! Tactical Battle - deterministic turn-based grid combat engine

pub mod battle;
pub mod core;
