use anyhow::Context;
use clap::Parser;
use dbcopy::adapters::mysql::create_table_sql;
use dbcopy::core::CopyPlan;
use dbcopy::utils::logger;
use dbcopy::{CliConfig, CopyEngine, CopyError, CopyPipeline, CopySettings, MySqlSink, PostgresSource};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    logger::init_logger(cli.verbose, cli.json_logs);

    tracing::info!("Starting dbcopy");

    let settings = match cli.resolve() {
        Ok(settings) => settings,
        Err(e) => fail(&e),
    };

    tracing::info!(
        from = %settings.source_url_redacted(),
        to = %settings.target_url_redacted(),
        "copy db"
    );
    if cli.verbose {
        tracing::debug!(
            schema = %settings.schema,
            prefix = %settings.table_prefix,
            batch_size = settings.batch_size,
            tables = ?settings.include_tables,
            exclude = ?settings.exclude_tables,
            "Resolved settings"
        );
    }

    let report = match run(&cli, &settings).await {
        Ok(report) => report,
        Err(e) => fail(&e),
    };

    if let (Some(path), Some(report)) = (&cli.report, &report) {
        let json = serde_json::to_string_pretty(report)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("cannot write report to {}", path))?;
        tracing::info!(path = %path, "Report written");
    }

    Ok(())
}

async fn run(cli: &CliConfig, settings: &CopySettings) -> dbcopy::Result<Option<dbcopy::core::CopyReport>> {
    let source = PostgresSource::connect(&settings.source_url, &settings.schema, settings.connect_timeout()).await?;

    if cli.fixtures {
        source.install_fixtures().await?;
    }

    if cli.dry_run {
        // The destination is never touched in a dry run.
        let sink = DryRunSink;
        let pipeline = CopyPipeline::new(source, sink, settings.clone());
        let plan = CopyEngine::new_with_monitoring(pipeline, settings.monitor).plan().await?;
        print_plan(&plan);
        return Ok(None);
    }

    let sink = MySqlSink::connect(&settings.target_url, settings.connect_timeout()).await?;
    let mut pipeline = CopyPipeline::new(source, sink, settings.clone());
    if settings.monitor {
        pipeline = pipeline.with_monitor(dbcopy::utils::monitor::SystemMonitor::new(true));
    }

    let engine = CopyEngine::new_with_monitoring(pipeline, settings.monitor);
    let report = engine.run().await?;

    println!("✅ Copied {} rows in {} tables", report.total_rows(), report.tables.len());
    for table in &report.tables {
        println!(
            "  {} -> {}: {} rows ({} ms)",
            table.source_table, table.target_table, table.rows_copied, table.elapsed_ms
        );
    }

    Ok(Some(report))
}

fn print_plan(plan: &CopyPlan) {
    println!("🔍 Dry run: {} tables would be copied, in this order", plan.tables.len());
    for table in &plan.tables {
        println!();
        println!("-- {} -> {}", table.source.name, table.target.name);
        println!("{};", create_table_sql(&table.target));
    }
}

fn fail(e: &CopyError) -> ! {
    tracing::error!(
        "❌ Copy failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    std::process::exit(e.exit_code())
}

/// Sink used by `--dry-run`; planning never reaches it.
struct DryRunSink;

#[async_trait::async_trait]
impl dbcopy::core::TableSink for DryRunSink {
    async fn recreate_table(&self, _table: &dbcopy::core::TableDef) -> dbcopy::Result<()> {
        Ok(())
    }

    async fn insert_rows(&self, _table: &dbcopy::core::TableDef, rows: &[dbcopy::core::Row]) -> dbcopy::Result<u64> {
        Ok(rows.len() as u64)
    }
}
