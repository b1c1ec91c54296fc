//! Integration tests for botdeck-console.
//!
//! These tests drive a `Console` against local mock servers:
//! - Push events invalidating observed views
//! - Guarded commands through the confirmation workflow

pub mod common;
