//! Runs command - list recorded pipeline runs

use crate::cli::args::{OutputFormat, RunsArgs};
use crate::config::Config;
use crate::error::DrydockResult;
use crate::pipeline::{RunRecord, RunStatus};
use console::style;

/// Execute the runs command
pub async fn execute(args: RunsArgs, _config: &Config) -> DrydockResult<()> {
    let mut records = RunRecord::list().await?;
    if args.limit > 0 {
        records.truncate(args.limit);
    }

    if records.is_empty() {
        println!("No recorded runs.");
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&records),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        OutputFormat::Plain => {
            for record in &records {
                println!("{}", record.id);
            }
        }
    }

    Ok(())
}

fn print_table(records: &[RunRecord]) {
    println!(
        "{:<38} {:<24} {:<8} {:<12} {:<18}",
        "RUN", "REPOSITORY", "STATUS", "STAGE", "STARTED"
    );
    println!("{}", "-".repeat(100));

    for record in records {
        let status = match record.status {
            RunStatus::Done => style("done").green().to_string(),
            RunStatus::Failed => style("failed").red().to_string(),
            RunStatus::Running => style("running").yellow().to_string(),
        };

        println!(
            "{:<38} {:<24} {:<8} {:<12} {:<18}",
            record.id,
            record.repository,
            status,
            record.stage,
            record.started_at.format("%Y-%m-%d %H:%M")
        );
    }

    println!();
    println!("Total: {} run(s)", records.len());
}
