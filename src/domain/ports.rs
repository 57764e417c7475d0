use crate::domain::model::{CopyPlan, CopyReport, Row, TableDef};
use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Where tables are copied from.
#[async_trait]
pub trait TableSource: Send + Sync {
    async fn reflect_tables(&self) -> Result<Vec<TableDef>>;

    /// Rows of `table`, in the order of `table.columns`.
    fn stream_rows<'a>(&'a self, table: &'a TableDef) -> BoxStream<'a, Result<Row>>;
}

/// Where tables are copied to.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Drops `table` if it exists and creates it empty.
    async fn recreate_table(&self, table: &TableDef) -> Result<()>;

    async fn insert_rows(&self, table: &TableDef, rows: &[Row]) -> Result<u64>;

    /// Upper bound on bind parameters in a single statement.
    fn max_bind_parameters(&self) -> usize {
        usize::MAX
    }
}

pub trait ConfigProvider: Send + Sync {
    fn table_prefix(&self) -> &str;
    fn batch_size(&self) -> usize;
    fn default_varchar_length(&self) -> u32;
    fn include_tables(&self) -> &[String];
    fn exclude_tables(&self) -> &[String];
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<TableDef>>;
    async fn transform(&self, tables: Vec<TableDef>) -> Result<CopyPlan>;
    async fn load(&self, plan: CopyPlan) -> Result<CopyReport>;
}
