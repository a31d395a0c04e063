#![forbid(unsafe_code)]

pub mod account;
pub mod admin;
pub mod api;
pub mod bookmarks;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod payment;
pub mod reader;
pub mod session;
pub mod token_store;
pub mod transport;
