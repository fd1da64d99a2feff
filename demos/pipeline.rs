//! # Example: Event Pipeline
//!
//! One app on an in-memory stream with three responders:
//! - `audit` sees every `user.*` event together with its name,
//! - `welcome` handles `user.created` only,
//! - `flaky` fails on odd ids (the failure is logged and the event dropped).
//!
//! Halfway through, the consumer unit is killed; the supervisor notices on its next tick
//! and starts a new one, which resumes after the last record taken.
//!
//! Run with: `cargo run --example pipeline`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use motion::{
    App, Call, Config, Event, EventKind, MemoryStream, ResponderError, ResponderFn, Runtime,
    Subscribe, Supervisor,
};

/// Prints supervision events.
struct Console;

#[async_trait]
impl Subscribe for Console {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::SlotStarting | EventKind::SlotDied => {
                println!("[{:?}] {}", ev.kind, ev.slot.as_deref().unwrap_or("?"));
            }
            EventKind::ResponderFailed => {
                println!(
                    "[{:?}] {} via {}: {}",
                    ev.kind,
                    ev.event_name.as_deref().unwrap_or("?"),
                    ev.pattern.as_deref().unwrap_or("?"),
                    ev.reason.as_deref().unwrap_or("")
                );
            }
            _ => println!("[{:?}]", ev.kind),
        }
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    motion::logging::init(false);

    let stream = MemoryStream::new("events");
    let mut builder = App::builder("users", stream.clone()).concurrency(3);

    builder.respond_to_named(
        "user.*",
        ResponderFn::arc("audit", |call: Call| async move {
            println!("audit: {:?} {}", call.event_name, call.payload);
            Ok::<_, ResponderError>(())
        }),
    )?;
    builder.respond_to(
        "user.created",
        ResponderFn::arc("welcome", |call: Call| async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            println!("welcome: {}", call.payload["name"]);
            Ok::<_, ResponderError>(())
        }),
    )?;
    builder.respond_to(
        "user.created",
        ResponderFn::arc("flaky", |call: Call| async move {
            match call.payload["id"].as_u64() {
                Some(id) if id % 2 == 1 => Err(ResponderError::fail(format!("odd id {id}"))),
                _ => Ok(()),
            }
        }),
    )?;

    let app = builder.build()?;
    let sup = Arc::new(
        Supervisor::builder(app)
            .with_subscribers(vec![Arc::new(Console) as Arc<dyn Subscribe>])
            .build(),
    );
    let handle = Arc::clone(&sup);

    let cfg = Config {
        check_interval: Duration::from_millis(100),
        grace: Duration::from_secs(2),
        ..Config::default()
    };

    Runtime::new(cfg)
        .with_shared(sup)
        .run_until(async move {
            let app = handle.app();
            for id in 1..=3 {
                let user = json!({ "id": id, "name": format!("user-{id}") });
                if let Err(e) = app.dispatch("user.created", &user).await {
                    eprintln!("dispatch failed: {e}");
                }
            }
            tokio::time::sleep(Duration::from_millis(300)).await;

            println!("killing consumer");
            handle.kill("consumer");
            tokio::time::sleep(Duration::from_millis(300)).await;

            for id in 4..=5 {
                let _ = app.dispatch("user.deleted", &json!({ "id": id })).await;
            }
            let _ = app.dispatch("order.placed", &json!({ "id": 99 })).await;
            tokio::time::sleep(Duration::from_millis(300)).await;

            for slot in handle.slots() {
                println!(
                    "{} alive={} state={:?} up={:?}",
                    slot.name, slot.alive, slot.state, slot.uptime
                );
            }
        })
        .await?;

    Ok(())
}
