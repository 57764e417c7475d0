pub mod adapters;
pub mod compose;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{MySqlSink, PostgresSource};
pub use compose::{ComposeFile, LintOptions, LintReport};
pub use config::{CopySettings, TomlConfig};
pub use core::{engine::CopyEngine, pipeline::CopyPipeline};
pub use utils::error::{CopyError, Result};
