use std::{ fmt, fs::File, io::Write, path::Path };

use anyhow::{ Context, Result };
use clap::ValueEnum;
use tracing::info;

use crate::aggregate::AggregateRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[value(name = "txt")]
    Text,
    #[value(name = "csv")]
    Csv,
}

impl ReportFormat {
    pub fn default_output(&self) -> &'static str {
        match self {
            ReportFormat::Text => "results.txt",
            ReportFormat::Csv => "results.csv",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Text => write!(f, "txt"),
            ReportFormat::Csv => write!(f, "csv"),
        }
    }
}

pub fn write_report(
    records: &[AggregateRecord],
    path: &Path,
    format: ReportFormat
) -> Result<()> {
    let content = match format {
        ReportFormat::Text => render_text(records),
        ReportFormat::Csv => render_csv(records),
    };
    let mut file = File::create(path).context(
        format!("cannot create report file {}", path.display())
    )?;
    file.write_all(content.as_bytes()).context("cannot write report file")?;
    info!(records = records.len(), "report written to {}", path.display());
    Ok(())
}

/// Column-aligned table. Addresses whose confidence stayed unknown are left
/// out here; the CSV rendering keeps them.
fn render_text(records: &[AggregateRecord]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<20}{:<20}{:<15}\n", "IP Address", "Confidence Score", "Sources"));
    out.push_str(&format!("{}\n", "-".repeat(55)));
    for record in records.iter().filter(|r| r.best_confidence.is_score()) {
        out.push_str(
            &format!(
                "{:<20}{:<20}{:<15}\n",
                record.ip.to_string(),
                record.best_confidence.to_string(),
                join_sources(record)
            )
        );
    }
    out
}

fn render_csv(records: &[AggregateRecord]) -> String {
    let mut out = String::from("ip,confidence,sources\n");
    for record in records {
        out.push_str(
            &format!("{},{},{}\n", record.ip, record.best_confidence, join_sources(record))
        );
    }
    out
}

fn join_sources(record: &AggregateRecord) -> String {
    record.sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join("+")
}
