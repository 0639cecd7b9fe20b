//! Folio - personal portfolio, blog, gallery and short-link service
//!
//! The HTTP surface lives in [`api`]; everything below it (services,
//! repositories, cache, page rendering) is usable on its own.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod render;
pub mod services;
