use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use ingest::{session_cost, session_records};
use usage_core::{Bucket, PricingTable};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("usage: ingest_cli <transcript.jsonl>");
        std::process::exit(2);
    }

    let path = Path::new(&args[1]);
    let records = session_records(path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        std::process::exit(1);
    });
    if records.is_empty() {
        eprintln!("no billable events found");
        std::process::exit(3);
    }

    let pricing = PricingTable::builtin();
    let mut by_model: BTreeMap<&str, Bucket> = BTreeMap::new();
    for (_, record) in records.iter() {
        let cost = pricing.cost(&record.model, &record.usage);
        by_model
            .entry(record.model.as_str())
            .or_default()
            .record(&record.usage, cost);
    }
    for (model, bucket) in &by_model {
        println!(
            "{} requests={} input={} output={} cache_read={} cache_write={} cost_usd={:.4}",
            model,
            bucket.requests,
            bucket.input_tokens,
            bucket.output_tokens,
            bucket.cache_read_tokens,
            bucket.total_cache_write(),
            bucket.cost_usd
        );
    }
    println!("records {}", records.len());
    println!("total_cost_usd {:.4}", session_cost(&records, pricing));
}
