use ely::mapper::{mapped_fields, EMITTER_FIELD};
use ely::{instrument_embedded, release, Record};
use serde_json::json;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!("Starting ely demo...");

    // 2. Build a record and instrument it in place
    let mut record = Record::from_json(json!({
        "title": "draft",
        "count": 0,
        "_cache": null,
    }))?;
    record.insert_method("describe", |_| json!("a record"));

    let source = instrument_embedded(&mut record, None)?;
    tracing::info!("Instrumented fields: {:?}", mapped_fields(&record));
    tracing::info!(
        "Embedded source reachable: {}",
        record.emitter(EMITTER_FIELD).is_some_and(|s| s == source)
    );

    source.on_any(|new, old, field| {
        tracing::info!("[CHANGE] {}: {} -> {}", field, old, new);
        Ok(())
    });

    // 3. Writes go through the shims
    record.set("title", json!("final"))?;
    record.set("count", json!(1))?;
    record.set("_cache", json!("not reported"))?;

    // 4. Put everything back
    release(&mut record);
    record.set("count", json!(2))?;
    tracing::info!("Released record: {}", record.to_json());

    Ok(())
}
