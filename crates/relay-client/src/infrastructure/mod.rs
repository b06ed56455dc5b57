//! Infrastructure layer for the terminal client.
//!
//! - **`terminal`** – Reading the display name and chat lines from stdin.

pub mod terminal;
