use crate::compose::ComposeFile;
use crate::config::settings::CopySettings;
use crate::config::toml_config::TomlConfig;
use crate::utils::error::Result;
use clap::Parser;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "dbcopy")]
#[command(about = "Copy every table of a PostgreSQL database into MySQL")]
pub struct CliConfig {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Source PostgreSQL URL
    #[arg(long, env = "DB_IN")]
    pub db_in: Option<String>,

    /// Destination MySQL URL
    #[arg(long, env = "DB_OUT")]
    pub db_out: Option<String>,

    /// Derive both URLs from the postgres and mysql services of a compose file
    #[arg(long)]
    pub compose: Option<String>,

    /// Source schema to copy
    #[arg(long)]
    pub schema: Option<String>,

    /// Copy only these tables
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Skip these tables
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Prefix for destination table names
    #[arg(long)]
    pub table_prefix: Option<String>,

    /// Rows per INSERT statement
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Seconds to wait for a database connection
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Install fixtures in the source database before copying
    #[arg(long)]
    pub fixtures: bool,

    /// Reflect and print the plan without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write the copy report as JSON to this file
    #[arg(long)]
    pub report: Option<String>,

    /// Log process CPU and memory after each phase
    #[arg(long)]
    pub monitor: bool,

    /// Log as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// Defaults, then compose file, then TOML file, then flags and
    /// environment. The result is normalized and validated.
    pub fn resolve(&self) -> Result<CopySettings> {
        let mut settings = CopySettings::default();

        if let Some(path) = &self.compose {
            let file = ComposeFile::from_file(path)?;
            settings.apply_compose(&file)?;
            tracing::debug!(compose = %path, "Applied compose file");
        }

        if let Some(path) = &self.config {
            TomlConfig::from_file(path)?.apply_to(&mut settings);
            tracing::debug!(config = %path, "Applied TOML config");
        }

        self.apply_to(&mut settings);
        settings.finalize()
    }

    fn apply_to(&self, settings: &mut CopySettings) {
        if let Some(url) = &self.db_in {
            settings.source_url = url.clone();
        }
        if let Some(url) = &self.db_out {
            settings.target_url = url.clone();
        }
        if let Some(schema) = &self.schema {
            settings.schema = schema.clone();
        }
        if !self.tables.is_empty() {
            settings.include_tables = self.tables.clone();
        }
        if !self.exclude.is_empty() {
            settings.exclude_tables = self.exclude.clone();
        }
        if let Some(prefix) = &self.table_prefix {
            settings.table_prefix = prefix.clone();
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(timeout) = self.connect_timeout {
            settings.connect_timeout_seconds = timeout;
        }
        if self.monitor {
            settings.monitor = true;
        }
    }
}
