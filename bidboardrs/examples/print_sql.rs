use std::env;

use bidboard::query_builder::Dimension;
use bidboard::{KpiMetric, ReportFilter, ReportQueryBuilder, TablePath, WarehouseKind};

fn usage() {
    eprintln!("Usage: print_sql <databricks|snowflake> [campaign] [keyword]");
    eprintln!("Example: cargo run --example print_sql -- snowflake \"Spring Sale\" crisps");
}

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let Some(kind) = args.next() else {
        usage();
        std::process::exit(1);
    };
    let kind: WarehouseKind = kind.parse()?;
    let campaign = args.next().unwrap_or_default();
    let keyword = args.next().unwrap_or_default();

    let table = TablePath::new(Some("default"), Some("bid_sample"), "keyword_performance")?;
    let builder = ReportQueryBuilder::for_backend(kind, table);
    let filter = ReportFilter::from_selection(&campaign, &keyword, None);

    let statements = [
        ("performance", builder.performance_rows(&filter)),
        ("kpi summary", builder.kpi_summary(None)),
        (
            "time series",
            builder.time_series(KpiMetric::DEFAULT_PRIMARY, KpiMetric::DEFAULT_SECONDARY),
        ),
        ("campaigns", builder.distinct_values(Dimension::Campaign)),
        ("tables", builder.show_tables()),
    ];
    for (name, query) in statements {
        println!("-- {name}");
        println!("{}", query.sql);
        if !query.params.is_empty() {
            println!("-- params: {}", serde_json::to_string(&query.params)?);
        }
    }
    Ok(())
}
