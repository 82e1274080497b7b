//! RollChain - hierarchical hash-chain ledgers for organizations
//!
//! Every organizational unit, group and member owns its own proof-of-work
//! chain. A child's genesis block links to its parent's latest hash at the
//! moment the child was created, and members carry an attendance event log
//! on top of their lifecycle blocks.
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the base chain and chain auditing
//! - [`transaction`] - Block payloads, profiles and event kinds
//! - [`hierarchy`] - Unit, group and member chains
//!
//! ## Orchestration
//! - [`registry`] - Creation order, cascades, queries and cross-chain validation
//! - [`service`] - Serialized async access with periodic autosave
//! - [`cache`] - Latest-state projection cache
//!
//! ## State Management
//! - [`persistence`] - Snapshot stores (JSON file, SQLite, memory)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`cli`] - CLI utilities

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod hierarchy;
pub mod transaction;

// ============================================================================
// Orchestration
// ============================================================================
pub mod cache;
pub mod registry;
pub mod service;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod cli;
pub mod config;
pub mod error;
