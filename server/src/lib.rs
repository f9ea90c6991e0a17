//! tilesync server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod chat;
pub mod config;
pub mod db;
pub mod directory;
pub mod presence;
pub mod proto;
pub mod routes;
pub mod state;
pub mod ws;
