use clap::Parser;
use commission_engine::application::engine::CommissionEngine;
use commission_engine::domain::actor::{ActorId, EmployeeId};
use commission_engine::domain::commission::NewCommission;
use commission_engine::domain::ports::{CommissionStoreBox, RuleStoreBox};
use commission_engine::domain::rule::{NewRule, RuleId};
use commission_engine::infrastructure::in_memory::{
    InMemoryCommissionStore, InMemoryRuleStore, StaticAccessPolicy, TracingAuditSink,
    UuidPublicIds,
};
use commission_engine::interfaces::csv::report_writer::ReportWriter;
use commission_engine::interfaces::csv::transaction_reader::TransactionReader;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input transactions CSV file
    input: PathBuf,

    /// Rule definitions file (JSON array)
    #[arg(long)]
    rules: PathBuf,

    /// Path to persistent database (optional). Requires the storage-rocksdb feature.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn stores(db_path: Option<PathBuf>) -> Result<(CommissionStoreBox, RuleStoreBox)> {
    match db_path {
        None => Ok((
            Box::new(InMemoryCommissionStore::new()),
            Box::new(InMemoryRuleStore::new()),
        )),
        Some(path) => open_persistent(path),
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(path: PathBuf) -> Result<(CommissionStoreBox, RuleStoreBox)> {
    use commission_engine::infrastructure::rocksdb::RocksDbStore;

    let store = RocksDbStore::open(path).into_diagnostic()?;
    Ok((Box::new(store.clone()), Box::new(store)))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(_path: PathBuf) -> Result<(CommissionStoreBox, RuleStoreBox)> {
    Err(miette::miette!(
        "--db-path requires building with the storage-rocksdb feature"
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the CSV report on stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let (commission_store, rule_store) = stores(cli.db_path)?;
    let engine = CommissionEngine::new(
        commission_store,
        rule_store,
        Box::new(StaticAccessPolicy::new().with_admin("cli")),
        Box::new(TracingAuditSink),
        Box::new(UuidPublicIds),
    );
    let actor = ActorId::new("cli");

    // Register rules up front; a structurally invalid rule aborts the run.
    let rules_raw = std::fs::read_to_string(&cli.rules).into_diagnostic()?;
    let drafts: Vec<NewRule> = serde_json::from_str(&rules_raw).into_diagnostic()?;
    let mut rules_by_name: HashMap<String, RuleId> = HashMap::new();
    for draft in drafts {
        let name = draft.name.clone();
        let rule = engine.create_rule(&actor, draft).await.into_diagnostic()?;
        rules_by_name.insert(name, rule.id);
    }

    // Process transactions; bad rows are reported and skipped.
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = TransactionReader::new(file);
    let mut created = Vec::new();
    for row_result in reader.rows() {
        match row_result {
            Ok(row) => {
                let Some(rule_id) = rules_by_name.get(&row.rule) else {
                    eprintln!("Unknown rule '{}' for employee {}", row.rule, row.employee);
                    continue;
                };
                let draft = NewCommission {
                    employee: EmployeeId::new(row.employee),
                    description: None,
                    currency: row.currency.unwrap_or_else(|| "USD".to_string()),
                    base_amount: row.revenue,
                    cost: row.cost,
                    commission_percentage: None,
                    total_amount: None,
                    rule: Some(rule_id.clone()),
                    source: None,
                    related_shipments: Vec::new(),
                    related_quotes: Vec::new(),
                };
                match engine.create(&actor, draft).await {
                    Ok(commission) => created.push(commission),
                    Err(e) => eprintln!("Error creating commission: {e}"),
                }
            }
            Err(e) => eprintln!("Error reading transaction: {e}"),
        }
    }

    // Output report
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_commissions(&created).into_diagnostic()?;

    Ok(())
}
