//! biglog: a backend for browsing log files too large to load in one go.
//!
//! The [`reader::LineScanner`] answers one-shot queries by streaming the
//! file. A [`session::ViewerSession`] keeps a buffered window of the file
//! and layers filtering, collapsing of repeated lines and pagination on top.

pub mod buffer;
pub mod cli;
pub mod cmd;
pub mod collapse;
pub mod config;
pub mod error;
pub mod filter;
pub mod mutate;
pub mod pagination;
pub mod protocol;
pub mod reader;
pub mod record;
pub mod session;
pub mod signal;
pub mod stats;
pub mod web;

#[cfg(test)]
pub(crate) mod test_utils;
