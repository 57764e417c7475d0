use clap::{Parser, ValueEnum};
use dbcopy::compose::{database_url, lint, ComposeFile, LintOptions, LintReport};
use dbcopy::utils::logger;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "compose-lint")]
#[command(about = "Check the database service declaration")]
struct Args {
    /// Compose file; searched for in the current directory when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Services that must be declared
    #[arg(long, value_delimiter = ',', default_value = "mysql,postgres")]
    expect: Vec<String>,

    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Also print the connection URL of each database service
    #[arg(long)]
    print_urls: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    let path = match args.file.clone().or_else(|| ComposeFile::find_in(".")) {
        Some(path) => path,
        None => {
            eprintln!("❌ No compose file found in the current directory");
            eprintln!("💡 Pass one with --file");
            std::process::exit(2);
        }
    };
    tracing::info!("📁 Linting {}", path.display());

    let file = match ComposeFile::from_file(&path) {
        Ok(file) => file,
        Err(e) => {
            tracing::error!("❌ Failed to load {}: {}", path.display(), e);
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(2);
        }
    };

    let options = LintOptions {
        expected_services: args.expect.clone(),
        ..LintOptions::default()
    };
    let report = lint(&file, &options);

    match args.format {
        Format::Text => print_text(&file, &report, args.print_urls),
        Format::Json => print_json(&file, &report, args.print_urls),
    }

    if !report.is_ok() {
        std::process::exit(1);
    }
}

fn print_text(file: &ComposeFile, report: &LintReport, print_urls: bool) {
    for finding in &report.findings {
        println!("{}", finding);
    }

    if print_urls {
        for (name, service) in &file.services {
            if let Some(url) = database_url(service) {
                println!("{}: {}", name, url);
            }
        }
    }

    let errors = report.errors().count();
    let warnings = report.warnings().count();
    if errors == 0 {
        println!("✅ {} services, {} warnings", file.services.len(), warnings);
    } else {
        println!("❌ {} errors, {} warnings", errors, warnings);
    }
}

fn print_json(file: &ComposeFile, report: &LintReport, print_urls: bool) {
    let urls: serde_json::Map<String, serde_json::Value> = if print_urls {
        file.services
            .iter()
            .filter_map(|(name, service)| database_url(service).map(|url| (name.clone(), url.into())))
            .collect()
    } else {
        serde_json::Map::new()
    };

    let output = serde_json::json!({
        "ok": report.is_ok(),
        "services": file.service_names(),
        "findings": report.findings,
        "urls": urls,
    });

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("❌ Cannot render report: {}", e);
            std::process::exit(2);
        }
    }
}
