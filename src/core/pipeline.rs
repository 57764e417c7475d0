use crate::core::ordering::dependency_order;
use crate::core::typemap::genericize;
use crate::core::{ConfigProvider, Pipeline, TableSink, TableSource};
use crate::domain::model::{ColumnDef, CopyPlan, CopyReport, Row, TableDef, TablePlan, TableReport};
use crate::utils::error::{CopyError, Result};
use crate::utils::monitor::SystemMonitor;
use futures::TryStreamExt;
use std::time::Instant;

/// Longest identifier MySQL accepts.
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Progress is logged each time this many more rows have been written.
pub const PROGRESS_EVERY: u64 = 1000;

pub struct CopyPipeline<S: TableSource, T: TableSink, C: ConfigProvider> {
    source: S,
    sink: T,
    config: C,
    monitor: Option<SystemMonitor>,
}

impl<S: TableSource, T: TableSink, C: ConfigProvider> CopyPipeline<S, T, C> {
    pub fn new(source: S, sink: T, config: C) -> Self {
        Self {
            source,
            sink,
            config,
            monitor: None,
        }
    }

    /// Logs process stats after every table.
    pub fn with_monitor(mut self, monitor: SystemMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Rows per INSERT: the configured batch size, capped so one statement
    /// stays under the sink's bind parameter limit.
    pub fn effective_batch_size(&self, table: &TableDef) -> usize {
        let columns = table.columns.len().max(1);
        let cap = (self.sink.max_bind_parameters() / columns).max(1);
        self.config.batch_size().max(1).min(cap)
    }

    fn target_table(&self, source: &TableDef) -> Result<TableDef> {
        let name = format!("{}{}", self.config.table_prefix(), source.name);
        if name.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(CopyError::SchemaError {
                table: source.name.clone(),
                message: format!(
                    "target name '{}' is longer than {} characters",
                    name, MAX_IDENTIFIER_LENGTH
                ),
            });
        }

        let columns = source
            .columns
            .iter()
            .map(|column| {
                let new_type = genericize(&column.column_type, self.config.default_varchar_length());
                tracing::info!(
                    table = %source.name,
                    column = %column.name,
                    previous = %column.column_type,
                    new = %new_type,
                    "reflected type"
                );
                ColumnDef {
                    name: column.name.clone(),
                    column_type: new_type,
                    nullable: column.nullable,
                    default: None,
                }
            })
            .collect();

        // Constraints and indexes are not copied, so neither are references.
        Ok(TableDef::new(name, columns))
    }

    async fn copy_table(&self, plan: &TablePlan) -> Result<TableReport> {
        let started = Instant::now();
        let source = &plan.source;
        let target = &plan.target;

        self.sink.recreate_table(target).await?;
        tracing::info!(table_name = %source.name, target = %target.name, "created_table");

        let batch_size = self.effective_batch_size(target);
        let mut batch: Vec<Row> = Vec::with_capacity(batch_size);
        let mut copied: u64 = 0;
        let mut next_progress = PROGRESS_EVERY;

        let mut rows = self.source.stream_rows(source);
        while let Some(row) = rows.try_next().await? {
            if row.len() != target.columns.len() {
                return Err(CopyError::ProcessingError {
                    message: format!(
                        "table '{}': row has {} values, expected {}",
                        source.name,
                        row.len(),
                        target.columns.len()
                    ),
                });
            }
            batch.push(row);

            if batch.len() >= batch_size {
                copied += self.sink.insert_rows(target, &batch).await?;
                batch.clear();

                while copied >= next_progress {
                    tracing::info!(table_name = %source.name, n = copied, "inserted");
                    next_progress += PROGRESS_EVERY;
                }
            }
        }

        if !batch.is_empty() {
            copied += self.sink.insert_rows(target, &batch).await?;
        }

        tracing::info!(
            table_name = %source.name,
            target = %target.name,
            rows = copied,
            "copied_table"
        );

        if let Some(monitor) = &self.monitor {
            monitor.log_stats(&format!("table {}", source.name));
        }

        Ok(TableReport {
            source_table: source.name.clone(),
            target_table: target.name.clone(),
            rows_copied: copied,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }
}

#[async_trait::async_trait]
impl<S: TableSource, T: TableSink, C: ConfigProvider> Pipeline for CopyPipeline<S, T, C> {
    async fn extract(&self) -> Result<Vec<TableDef>> {
        let tables = self.source.reflect_tables().await?;
        tracing::debug!(count = tables.len(), "Reflected source tables");

        let include = self.config.include_tables();
        let exclude = self.config.exclude_tables();

        if let Some(missing) = include
            .iter()
            .find(|name| !tables.iter().any(|t| &t.name == *name))
        {
            return Err(CopyError::SchemaError {
                table: missing.clone(),
                message: "table requested with --tables does not exist in the source".to_string(),
            });
        }

        let selected: Vec<TableDef> = tables
            .into_iter()
            .filter(|t| include.is_empty() || include.contains(&t.name))
            .filter(|t| !exclude.contains(&t.name))
            .collect();

        Ok(selected)
    }

    async fn transform(&self, tables: Vec<TableDef>) -> Result<CopyPlan> {
        let order = dependency_order(&tables);

        let mut slots: Vec<Option<TableDef>> = tables.into_iter().map(Some).collect();
        let mut plan = CopyPlan::default();

        // Dependents first.
        for i in order.into_iter().rev() {
            if let Some(source) = slots[i].take() {
                let target = self.target_table(&source)?;
                plan.tables.push(TablePlan { source, target });
            }
        }

        Ok(plan)
    }

    async fn load(&self, plan: CopyPlan) -> Result<CopyReport> {
        let mut report = CopyReport::default();

        for table in &plan.tables {
            report.tables.push(self.copy_table(table).await?);
        }

        Ok(report)
    }
}
