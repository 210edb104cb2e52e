//! Bullride backend server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod baskets;
pub mod chat;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod stocks;
pub mod ws;
