//! Terminal output.
//!
//! - [`theme`] - Colors, icons and column widths
//! - [`console`] - The [`Reporter`](criage_core::Reporter) commands hand to the core
//! - [`list`] - Column-aligned rows for listings

pub mod console;
pub mod list;
pub mod theme;

pub use console::ConsoleReporter;
pub use theme::Theme;
