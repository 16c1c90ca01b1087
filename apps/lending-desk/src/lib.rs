//! # Nebula Lending Desk
//!
//! A fixed shelf of books lent to concurrent readers through a
//! [`nebula_pool::Pool`]. The desk tracks how often each copy went out and
//! who holds it now.

pub mod book;
pub mod config;
pub mod desk;
pub mod error;

pub use book::{Book, shelf};
pub use config::DeskConfig;
pub use desk::{BookReport, Checkout, LendingDesk, RunSummary, run_readers};
pub use error::{Error, Result};
