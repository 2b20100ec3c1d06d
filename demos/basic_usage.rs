//! Basic logger usage example
//!
//! Demonstrates console logging at every npm level, structured fields and
//! error events.
//!
//! Run with: cargo run --example basic_usage

use trace_fanout_logger::prelude::*;
use trace_fanout_logger::{info, warn};

fn main() -> Result<()> {
    println!("=== Trace Fanout Logger - Basic Usage Example ===\n");

    let logger = Logger::builder()
        .sink(ConsoleAppender::new(), LogLevel::Silly, FormatPipeline::cli())
        .build();

    println!("1. Logging at different levels:");
    logger.error("This is an error message");
    logger.warn("This is a warning message");
    logger.info("This is an info message");
    logger.http("GET /health 200");
    logger.verbose("This is a verbose message");
    logger.debug("This is a debug message");
    logger.silly("This is a silly message");

    println!("\n2. Structured fields:");
    logger.log(
        MessageEvent::new(LogLevel::Info, "Order placed")
            .with_field("orderId", "o-1042")
            .with_field("items", 3)
            .with_field("express", true),
    );

    println!("\n3. Formatting macros and custom levels:");
    info!(logger, "Listening on port {}", 8080);
    warn!(logger, "Retry attempt {} of {}", 2, 5);
    logger.log(MessageEvent::new("audit", "Custom levels pass every filter"));

    println!("\n4. Errors:");
    let err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.toml not found");
    logger.log_error(&err);

    logger.flush()?;
    println!("\n=== Example completed successfully! ===");

    Ok(())
}
