//! Test helpers module
//!
//! This module provides a ready-to-use admission engine over the in-memory
//! ledger, Postgres and Redis contexts backed by containers, seeding
//! helpers, and ledger invariant checks shared by the integration tests.

#![allow(dead_code, unused_imports)]

pub mod ledger_context;
pub mod postgres_context;
pub mod redis_context;

pub use ledger_context::*;
pub use postgres_context::*;
pub use redis_context::*;
