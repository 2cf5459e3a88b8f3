//! Developer utilities shared by RAL tests, benches and demo apps.

pub mod headless;

pub use headless::{HeadlessBackend, HeadlessObject, Journal, JournalEntry};
