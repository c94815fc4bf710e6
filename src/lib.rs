//! TrinityChain Explorer - live views over a TrinityChain node
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Document Model
//! - [`dom`] - In-memory element tree, markup parser, selectors and keyed list reconciliation
//!
//! ## View State
//! - [`store`] - Single-writer state container
//! - [`binder`] - Declarative element bindings (load / render)
//!
//! ## Pages
//! - [`blocks`] - Live block list with gap filling and pagination
//! - [`stakes`] - Make-stake modal and amount handling
//!
//! ## Networking
//! - [`feed`] - Realtime block feed over a Phoenix channel
//! - [`pagination`] - JSON page fetching
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Document Model
// ============================================================================
pub mod dom;

// ============================================================================
// View State
// ============================================================================
pub mod binder;
pub mod store;

// ============================================================================
// Pages
// ============================================================================
pub mod blocks;
pub mod stakes;

// ============================================================================
// Networking
// ============================================================================
pub mod feed;
pub mod pagination;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{ExplorerError, Result};
