use std::sync::{Arc, Mutex};

use kernel::{EventBus, HandlerResult};
use kernel_core::Context;
use serde_json::Value;

/// Build a context map from a JSON object literal.
pub fn context(value: Value) -> Context {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Subscribe a handler that records every payload it receives on `topic`.
pub fn capture(bus: &EventBus, topic: &str, owner: &str) -> Arc<Mutex<Vec<Value>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    bus.subscribe(
        topic,
        move |payload: &Value, _: &str| -> HandlerResult {
            sink.lock().map_err(|e| e.to_string())?.push(payload.clone());
            Ok(())
        },
        Some(owner),
    );
    seen
}

/// Route library logs to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
