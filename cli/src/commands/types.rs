//! Types command implementation

use super::{CommonArgs, RunContext};
use crate::output;
use anyhow::Result;
use clap::Args;
use vitalscope_aggregator::census::TypeCensus;
use vitalscope_shared::utils::group_thousands;

#[derive(Args, Debug)]
pub struct TypesArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Only list the N most common types
    #[arg(short, long)]
    pub top: Option<usize>,
}

pub fn run(args: TypesArgs) -> Result<()> {
    let ctx = RunContext::load(&args.common)?;

    let mut census = TypeCensus::new();
    ctx.ingest(ctx.ingest_options(), &mut census)?;
    let ranked = census.ranked();

    if ranked.is_empty() {
        output::warning("No records found in the export.");
        return Ok(());
    }

    output::header("RECORD TYPES");
    println!(
        "  {} records across {} types",
        group_thousands(census.total()),
        ranked.len()
    );
    println!("\n  {:>4} {:>12}  {:<56} {}", "#", "RECORDS", "TYPE", "AGGREGATED AS");

    let shown = args.top.unwrap_or(ranked.len()).min(ranked.len());
    for (i, entry) in ranked.iter().take(shown).enumerate() {
        let kind = entry.kind.map(|k| k.label()).unwrap_or("-");
        println!(
            "  {:>4} {:>12}  {:<56} {}",
            i + 1,
            group_thousands(entry.count),
            entry.identifier,
            kind
        );
    }
    if shown < ranked.len() {
        output::info(&format!("{} more types not shown", ranked.len() - shown));
    }

    ctx.maybe_write_json(&ranked, "record_types.json")?;
    Ok(())
}
