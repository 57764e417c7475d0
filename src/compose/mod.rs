//! The service declaration (`docker-compose.yml`) the databases run from.

pub mod endpoints;
pub mod lint;
pub mod model;

pub use endpoints::database_url;
pub use lint::{lint, Finding, LintOptions, LintReport, Severity};
pub use model::{ComposeFile, PortMapping, ServiceDefinition};
