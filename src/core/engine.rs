use crate::core::{CopyPlan, CopyReport, Pipeline};
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct CopyEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> CopyEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    /// Reflects and plans without touching the destination.
    pub async fn plan(&self) -> Result<CopyPlan> {
        tracing::info!("Reflecting source schema...");
        let tables = self.pipeline.extract().await?;
        tracing::info!("Reflected {} tables", tables.len());
        self.monitor.log_stats("Extract");

        let plan = self.pipeline.transform(tables).await?;
        tracing::info!("Planned {} tables", plan.tables.len());
        self.monitor.log_stats("Transform");

        Ok(plan)
    }

    pub async fn run(&self) -> Result<CopyReport> {
        tracing::info!("Starting copy...");

        let plan = self.plan().await?;

        tracing::info!("Copying rows...");
        let report = self.pipeline.load(plan).await?;
        tracing::info!(
            "Copied {} rows across {} tables",
            report.total_rows(),
            report.tables.len()
        );
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{TableDef, TablePlan, TableReport};
    use crate::utils::error::CopyError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct ScriptedPipeline {
        fail_extract: bool,
        loaded: Arc<AtomicBool>,
    }

    #[async_trait::async_trait]
    impl Pipeline for ScriptedPipeline {
        async fn extract(&self) -> Result<Vec<TableDef>> {
            if self.fail_extract {
                return Err(CopyError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            Ok(vec![TableDef::new("users", vec![])])
        }

        async fn transform(&self, tables: Vec<TableDef>) -> Result<CopyPlan> {
            Ok(CopyPlan {
                tables: tables
                    .into_iter()
                    .map(|t| TablePlan {
                        target: TableDef::new(format!("dbin_{}", t.name), vec![]),
                        source: t,
                    })
                    .collect(),
            })
        }

        async fn load(&self, plan: CopyPlan) -> Result<CopyReport> {
            self.loaded.store(true, Ordering::SeqCst);
            Ok(CopyReport {
                tables: plan
                    .tables
                    .into_iter()
                    .map(|p| TableReport {
                        source_table: p.source.name,
                        target_table: p.target.name,
                        rows_copied: 3,
                        elapsed_ms: 0,
                    })
                    .collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_run_executes_all_phases() {
        let loaded = Arc::new(AtomicBool::new(false));
        let engine = CopyEngine::new(ScriptedPipeline {
            fail_extract: false,
            loaded: loaded.clone(),
        });

        let report = engine.run().await.unwrap();
        assert!(loaded.load(Ordering::SeqCst));
        assert_eq!(report.total_rows(), 3);
        assert_eq!(report.tables[0].target_table, "dbin_users");
    }

    #[tokio::test]
    async fn test_plan_does_not_load() {
        let loaded = Arc::new(AtomicBool::new(false));
        let engine = CopyEngine::new(ScriptedPipeline {
            fail_extract: false,
            loaded: loaded.clone(),
        });

        let plan = engine.plan().await.unwrap();
        assert_eq!(plan.tables.len(), 1);
        assert!(!loaded.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_extract_failure_stops_the_run() {
        let loaded = Arc::new(AtomicBool::new(false));
        let engine = CopyEngine::new(ScriptedPipeline {
            fail_extract: true,
            loaded: loaded.clone(),
        });

        tokio_test::assert_err!(engine.run().await);
        assert!(!loaded.load(Ordering::SeqCst));
    }
}
