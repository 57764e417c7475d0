// Adapters layer: sqlx-backed implementations of the table ports.

pub mod mysql;
pub mod postgres;

pub use mysql::MySqlSink;
pub use postgres::PostgresSource;
