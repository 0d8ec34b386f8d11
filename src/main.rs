use chrono::{NaiveDate, Utc};
use clap::Parser;
use fairpos::application::dispatcher::Dispatcher;
use fairpos::application::ledger::LedgerWriter;
use fairpos::application::reports::ReportAggregator;
use fairpos::config::Config;
use fairpos::domain::ports::LedgerStoreRef;
use fairpos::domain::session::SessionId;
use fairpos::infrastructure::catalog_cache::CatalogCache;
use fairpos::infrastructure::csv_catalog::CsvCatalogSource;
use fairpos::infrastructure::in_memory::InMemoryLedgerStore;
use fairpos::interfaces::csv::event_reader::EventReader;
use fairpos::interfaces::csv::report_writer::ReportWriter;
use fairpos::interfaces::render::Outbound;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Vendor sheet CSV file
    vendors: PathBuf,

    /// Product sheet CSV file
    products: PathBuf,

    /// Script of inbound session events CSV file
    events: PathBuf,

    /// Day to report totals for, YYYY-MM-DD (defaults to today, UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Path to persistent ledger database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; deployments inject env vars directly.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env();

    let source = Arc::new(CsvCatalogSource::new(cli.vendors.clone(), cli.products.clone()));
    let catalog = Arc::new(CatalogCache::new(source));
    // Cold start: the sheets must load once before any session is served.
    catalog.refresh_now().await.into_diagnostic()?;
    let refresh = catalog.spawn_refresh_task(config.refresh_interval);

    let store = ledger_store(&cli)?;
    let writer = Arc::new(LedgerWriter::new(
        Arc::clone(&store),
        config.commit_retry.clone(),
    ));
    let reports = Arc::new(ReportAggregator::new(
        Arc::clone(&store),
        config.report_page_size,
    ));

    // Stand-in for the chat transport: render instructions go to stdout,
    // one line per reply.
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(256);
    let printer = tokio::spawn(async move {
        while let Some(out) = out_rx.recv().await {
            println!("@{} {}", out.session, out.reply.text.replace('\n', " | "));
        }
    });

    let dispatcher = Dispatcher::new(
        Arc::clone(&catalog),
        writer,
        Arc::clone(&reports),
        out_tx,
        &config,
    );

    let events = File::open(cli.events).into_diagnostic()?;
    for event in EventReader::new(events).events() {
        match event {
            Ok(event) => {
                dispatcher
                    .dispatch(SessionId(event.session), &event.payload)
                    .await;
            }
            Err(e) => eprintln!("Error reading event: {e}"),
        }
    }

    // Waits for every session's queue to drain, in-flight commits included.
    dispatcher.shutdown().await;
    refresh.abort();
    printer.await.into_diagnostic()?;

    let day = cli.date.unwrap_or_else(|| Utc::now().date_naive());
    let totals = reports.daily_totals(day).await.into_diagnostic()?;
    let snapshot = catalog.snapshot().await;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer
        .write_totals(&totals, snapshot.as_deref())
        .into_diagnostic()?;

    Ok(())
}

fn init_tracing() {
    // Logs go to stderr so stdout stays parseable as the report CSV.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();
}

#[cfg(feature = "storage-rocksdb")]
fn ledger_store(cli: &Cli) -> Result<LedgerStoreRef> {
    use fairpos::infrastructure::rocksdb::RocksDbLedgerStore;
    Ok(match &cli.db_path {
        Some(path) => Arc::new(RocksDbLedgerStore::open(path).into_diagnostic()?),
        None => Arc::new(InMemoryLedgerStore::new()),
    })
}

#[cfg(not(feature = "storage-rocksdb"))]
fn ledger_store(_cli: &Cli) -> Result<LedgerStoreRef> {
    Ok(Arc::new(InMemoryLedgerStore::new()))
}
