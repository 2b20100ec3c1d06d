//! Fan-out example
//!
//! Wires all four sinks: console, rotating file, an in-memory search index
//! transport and a database receiver, with a toy APM agent supplying trace ids.
//!
//! Run with: cargo run --example sink_fanout

use serde_json::Value;
use std::sync::Arc;
use trace_fanout_logger::appenders::{FnReceiver, IndexTransport};
use trace_fanout_logger::prelude::*;

/// Prints bulk requests instead of sending them
struct PrintTransport;

impl IndexTransport for PrintTransport {
    fn put_template(&self, name: &str, template: &Value) -> Result<()> {
        println!("[index] PUT _template/{} {}", name, template);
        Ok(())
    }

    fn bulk(&self, body: String) -> Result<()> {
        print!("[index] POST _bulk\n{}", body);
        Ok(())
    }

    fn endpoint(&self) -> &str {
        "stdout"
    }
}

struct DemoApm;

impl ApmAgent for DemoApm {
    fn current_transaction(&self) -> Option<Correlation> {
        Some(Correlation::new("0af7651916cd43dd8448eb211c80319c", "b7ad6b7169203331"))
    }

    fn capture_error(&self, error: &ErrorEvent) {
        println!("[apm] captured {}: {}", error.name, error.message);
    }
}

fn main() -> Result<()> {
    println!("=== Trace Fanout Logger - Sink Fan-out Example ===\n");

    let mut config = LoggerConfig::default();
    config.file.directory = "demo-logs".into();
    config.search_index.enabled = true;
    config.database.enabled = true;

    let receiver = FnReceiver::new(|record: Value| async move {
        println!("[db] {}", record);
        Ok::<(), LoggerError>(())
    });

    let logger = LoggerSetup::new(config)
        .with_apm(Arc::new(DemoApm))
        .with_receiver(Arc::new(receiver))
        .with_index_transport(Box::new(PrintTransport))
        .try_build()?;

    println!("Registered sinks: {:?}\n", logger.sink_names());

    logger.log(MessageEvent::new(LogLevel::Info, "Checkout completed").with_field("cartId", "c-77"));
    logger.log(ErrorEvent::new(
        "PaymentError",
        "card declined",
        "PaymentError: card declined\n    at charge (payments.rs:42)",
    ));

    logger.flush()?;

    let metrics = logger.metrics();
    println!(
        "\nDispatched: {}, sink failures: {}, APM captures: {}",
        metrics.total_logged(),
        metrics.sink_failures(),
        metrics.apm_captures()
    );

    Ok(())
}
