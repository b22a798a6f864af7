//! Shared library modules for the herald registry bots.
//!
//! The binary wires these together; they are exported as a library so
//! unit tests and future standalone tools can reuse them.

#![allow(async_fn_in_trait)]

pub mod chain;
pub mod config;
pub mod links;
pub mod oracle;
pub mod payload;
pub mod registry;
pub mod social;
pub mod store;
pub mod supervisor;
pub mod xref;
