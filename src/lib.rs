//! kbase - A pluggable knowledge-base layer.
//!
//! This library gives conversational agents a uniform abstraction over
//! heterogeneous vector-store backends, plus a manager that coordinates
//! multiple independently-configured knowledge bases and merges their search
//! results.
//!
//! # Modules
//!
//! - [`item`] - Knowledge item data model and search types
//! - [`backend`] - Knowledge backend contract and the sealed variant set
//! - [`store`] - Vector store collaborator trait and implementations
//! - [`manager`] - Manager owning named backends with fan-out search
//! - [`config`] - Configuration loading
//! - [`commands`] - High-level operations shared by CLI callers
//! - [`cli`] - Command-line interface definitions

pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod item;
pub mod manager;
pub mod store;
