// src/lib.rs — Library root for renglo-lib
//
// Controllers and models consumed by the API layer. This crate exposes no
// HTTP routes of its own.

pub mod agent;
pub mod auth;
pub mod blueprint;
pub mod data;
pub mod docs;
pub mod infra;
pub mod schd;
