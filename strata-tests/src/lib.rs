//! Shared test utilities for Strata crates
//!
//! This crate provides:
//! - **Fixtures**: prebuilt asset graphs and IO managers
//! - **Assertions**: helpers for checking selections, materializations and errors
//!
//! # Example
//!
//! ```ignore
//! use strata_tests::{assertions, fixtures};
//!
//! #[test]
//! fn test_subset() {
//!     let (store, io_manager) = fixtures::asset_aware_io_manager();
//!     let group = fixtures::diamond_group(false, false, io_manager);
//!     let result = group.materialize(Some("+f".into())).unwrap();
//!     assertions::assert_materialized(&result, &["d", "e", "f"]);
//! }
//! ```

pub mod assertions;
pub mod fixtures;

pub use fixtures::{asset_aware_io_manager, diamond_assets, diamond_group, ConstantIoManager};
