use bidboard::{Bidboard, BidboardConfig, QueryOutcome};

fn print_outcome(outcome: QueryOutcome) {
    match outcome {
        QueryOutcome::Rows(table) => {
            println!("{}", table.column_names().join(" | "));
            for row in table.rows() {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("{}", cells.join(" | "));
            }
        }
        QueryOutcome::Failed(failure) => println!("failed: {failure}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bidboard::runtime::init_tracing();

    let config = BidboardConfig::load_default();
    let sample_limit = config.query.sample_row_limit;
    let table = config.report.table.clone();
    let app = Bidboard::from_config(config)?;
    let diag = &app.diagnostics;

    println!("data source: {}", diag.data_source_name());
    if !diag.test_connection().await {
        println!("connection test failed; check credentials");
        return Ok(());
    }
    println!("connection ok");

    println!("\n== tables");
    print_outcome(diag.list_tables().await);

    println!("\n== sample of {table}");
    print_outcome(diag.sample_rows(&table, sample_limit).await);

    match app.reports.dashboard_metrics(None).await {
        Ok(Some(kpis)) => println!("\n== kpis\n{}", serde_json::to_string_pretty(&kpis)?),
        Ok(None) => println!("\n== kpis\nno data"),
        Err(failure) => println!("\n== kpis\nfailed: {failure}"),
    }
    Ok(())
}
