//! Integration Tests
//!
//! End-to-end runs of the whole pipeline against a scripted transport and a
//! temporary output directory.

#[path = "../common/mod.rs"]
mod common;

mod gated_persist;
