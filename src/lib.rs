//! asak: archive URLs through pluggable handlers.
//!
//! Each URL is normalized and handed to every registered handler whose
//! handles intersect the requested set. Handles are selected on the command
//! line with `--use` or through named macros from an INI-style file.

pub mod cli;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod handlers;
pub mod logging;
pub mod macros;
pub mod selection;
