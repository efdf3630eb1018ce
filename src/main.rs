use clap::Parser;
use color_eyre::Result;
use datadash::error_display::user_message_from_report;
use datadash::wrangle::{wrangle, write_csv, DateIndexOutcome, WrangleOptions};
use datadash::{init_logging, AppConfig, ConfigManager, APP_NAME};
use datadash_cli::Args;
use std::path::Path;

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config_manager) => match config_manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

/// Wrangle one file and print what the dashboard would report about it.
fn clean(path: &Path, output: Option<&Path>, config: &AppConfig) -> Result<()> {
    let wrangled = wrangle(path, &WrangleOptions::from(&config.wrangle))?;

    println!("File: {}", path.display());
    println!("Rows after cleaning: {}", wrangled.data.height());
    println!("Duplicate rows removed: {}", wrangled.duplicate_rows);
    match &wrangled.date_index {
        DateIndexOutcome::NotFound => println!("Date index: none"),
        DateIndexOutcome::Parsed { column, format } => {
            println!("Date index: {} (format {})", column, format)
        }
        DateIndexOutcome::Unparsed { column, reason } => {
            println!("Date index: {} (kept as text: {})", column, reason)
        }
    }
    println!("Null values before cleaning:");
    for entry in wrangled.null_summary.iter() {
        println!("  {:<24} {}", entry.column, entry.nulls);
    }

    if let Some(output) = output {
        write_csv(&wrangled.data, output)?;
        println!("Cleaned data written to {}", output.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let mut config = AppConfig::load(APP_NAME, args.config.as_deref())?;
    config.apply_args(&args);
    config.validate()?;
    init_logging(&config.logging)?;

    if let Some(path) = &args.clean {
        if let Err(e) = clean(path, args.output.as_deref(), &config) {
            eprintln!("Error: {}", user_message_from_report(&e, Some(path)));
            std::process::exit(1);
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(datadash::server::serve(config));
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
