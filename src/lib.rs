//! mediapress - A media publishing backend
//!
//! This library provides the core functionality of the mediapress REST API:
//! accounts, categories, typed content, comments, likes, follows, bookmarks,
//! search and trending.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
