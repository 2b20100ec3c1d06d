//! File logging example
//!
//! Builds the logger from configuration: a rotating logfmt file at `verbose`
//! and a console sink at `info`.
//!
//! Run with: cargo run --example file_logging

use trace_fanout_logger::prelude::*;

fn main() -> Result<()> {
    println!("=== Trace Fanout Logger - File Logging Example ===\n");

    let config = LoggerConfig::from_toml_str(
        r#"
        timestamp_format = "%Y-%m-%d %H:%M:%S"

        [console]
        level = "info"

        [file]
        directory = "demo-logs"
        rotation = "size"
        max_size_bytes = 65536
        max_backups = 3
        compress = true
        "#,
    )?;
    let logger = Logger::try_from_config(&config)?;

    println!("1. Logging to both console and file:");
    logger.info("Application started");
    logger.verbose("Loading configuration...");
    logger.info("Configuration loaded successfully");
    logger.warn("Using default settings for some options");
    logger.error("Failed to load optional plugin");

    println!("\n2. Performing some operations (file only below info):");
    for i in 1..=5 {
        logger.log(
            MessageEvent::new(LogLevel::Verbose, format!("Processing item {}/5", i))
                .with_field("item", i),
        );
    }

    logger.info("All operations completed");
    logger.flush()?;

    println!("\n=== Example completed successfully! ===");
    println!("Check '{}' for the full log output", config.file.path().display());

    Ok(())
}
