//! Core types and definitions for the CLASH combat runtime.
//!
//! This crate defines the vocabulary shared across all other crates:
//! attack data, components, damage records, events, constants and
//! configuration. It has no dependency on any runtime or scheduler.

pub mod attack;
pub mod components;
pub mod config;
pub mod constants;
pub mod enums;
pub mod error;
pub mod events;
pub mod types;
