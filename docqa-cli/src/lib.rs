//! `docqa` command-line interface: build an index from a Markdown library,
//! ask questions against it, and compare embeddings.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command, RagArgs};
pub use commands::{NO_MATCHES_MESSAGE, run_compare, run_index, run_query};
