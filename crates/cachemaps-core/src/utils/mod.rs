//! Utility functions for string formatting.

pub mod format;

pub use format::{display_name_from_file_name, truncate_string};
