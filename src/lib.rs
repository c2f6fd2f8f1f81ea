// Copyright 2026 TileLight Project Authors. Licensed under Apache-2.0.

//! TileLight: the columnar tile-group storage core of an in-memory
//! relational engine with multi-version concurrency control.
//!
//! Tables are split horizontally into tile groups; each group splits
//! its columns vertically into tiles and coordinates concurrent
//! readers and writers through a per-slot MVCC header. The SQL
//! [`parser`], the [`planner`] bridge, and the [`executor`] form a
//! thin query surface over the storage core, wired together by
//! [`Database`].

#![deny(unused_must_use)]

pub mod catalog;
mod db;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod storage;
pub mod transaction;
pub mod types;

pub use self::db::{Database, Error};
