//! rowflow demo - loads a small grouped dataset and streams transactions.
//!
//! Set `RUST_LOG=rowflow_pipeline=debug` to watch the stages run.

use rowflow_core::{field_id_fn, Record, RowEntity};
use rowflow_model::{RowModel, RowModelConfig};
use rowflow_pipeline::stages::sum_fields;
use rowflow_store::{Transaction, TransactionResult};
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG: &str = r#"{
    "group_by": ["country"],
    "group_default_expanded": -1,
    "group_footers": true,
    "grand_total_footer": true,
    "sort": [{ "field": "gold", "direction": "desc" }],
    "batch_wait_ms": 20
}"#;

const DATA: &str = r#"[
    { "id": 1, "athlete": "Phelps", "country": "US", "gold": 8 },
    { "id": 2, "athlete": "Coughlin", "country": "US", "gold": 1 },
    { "id": 3, "athlete": "Thorpe", "country": "AU", "gold": 3 },
    { "id": 4, "athlete": "Hackett", "country": "AU", "gold": 2 },
    { "id": 5, "athlete": "Biedermann", "country": "DE", "gold": 0 }
]"#;

fn describe(row: &RowEntity) -> String {
    let source = row.value_source();
    let field = |name: &str| source.and_then(|r| r.get(name)).map(|v| v.to_string()).unwrap_or_default();
    let indent = "  ".repeat(row.level.max(0) as usize);
    if row.footer {
        format!("{indent}total {}", field("gold"))
    } else if row.group {
        format!("{indent}{} ({})", field("country"), field("gold"))
    } else {
        format!("{indent}{} {}", field("athlete"), field("gold"))
    }
}

fn print_rows(model: &RowModel) {
    for index in 0..model.row_count() {
        if let Some(row) = model.row_at(index) {
            println!("{:>3} {:>4}px  {}", index, row.row_top.unwrap_or_default(), describe(row));
        }
    }
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rowflow_model=debug")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RowModelConfig::from_json_str(CONFIG)?;
    let mut model = RowModel::builder(config)
        .id_fn(field_id_fn("id"))
        .aggregator(sum_fields(&["gold"]))
        .build();
    model.subscribe(|event, rows| {
        tracing::info!(rows = event.row_count, row_events = rows.len(), "model updated");
    });

    model.load_json(DATA)?;
    print_rows(&model);

    let record = |id: i64, athlete: &str, country: &str, gold: i64| {
        Record::new()
            .with("id", id)
            .with("athlete", athlete)
            .with("country", country)
            .with("gold", gold)
            .into_ref()
    };

    let done = model.apply_transaction_batched(
        Transaction::new().update([record(5, "Biedermann", "DE", 9)]),
        Some(Box::new(|result: &TransactionResult| tracing::info!(updated = result.update.len(), "update applied"))),
    );
    model.apply_transaction_batched(Transaction::new().add([record(6, "Trickett", "AU", 4)]), None);

    let deadline = model.batch_deadline().unwrap_or_else(Instant::now);
    while !model.poll_batched(Instant::now()) {
        std::thread::sleep(deadline.saturating_duration_since(Instant::now()).max(Duration::from_millis(1)));
    }
    let result = done.recv()?;
    tracing::info!(rows = ?result.update, "batch delivered");
    print_rows(&model);

    Ok(())
}
