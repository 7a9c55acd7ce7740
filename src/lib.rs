//! # pbuild - Local builds for web application projects
//!
//! pbuild builds the applications of a project checkout into timestamped
//! build directories, reusing earlier builds when the source has not changed.
//!
//! ## Features
//!
//! - **Toolchain Detection**: Drupal, Symfony and static sites, or an explicit `toolstack`
//! - **Build Archives**: Builds are saved under a hash of the application's git state
//! - **Retention**: Old builds and archives are pruned by age and count
//!
//! ## Quick Start
//!
//! ```bash
//! # From anywhere inside the project
//! pbuild build
//!
//! # Remove old builds
//! pbuild clean --keep 3
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Build orchestration and retention
//! - [`cache`] - Tree IDs and build archive lookup
//! - [`toolchain`] - Toolchain detection and dispatch
//! - [`filesystem`] - Copy, link and archive operations

/// Build orchestration, hook warnings and retention.
pub mod build;

/// Tree-hash addressed build archives.
pub mod cache;

/// Application (`.platform.app.yaml`) and project (`pbuild.toml`) configuration.
pub mod config;

/// Copying, symlinking and archiving.
pub mod filesystem;

/// Read-only git queries used for tree IDs.
pub mod git;

/// Project layout and discovery.
pub mod project;

/// External command execution.
pub mod shell;

/// Toolchain detection and dispatch.
pub mod toolchain;

/// Terminal UI utilities (tables).
pub mod ui;
