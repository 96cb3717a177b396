//! Report renderers for CLI commands.

use anyhow::anyhow;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

/// A command result that can be printed as JSON or as aligned text.
pub(crate) trait Report: Serialize {
    fn table_lines(&self) -> Vec<String>;
}

pub(crate) fn render(report: &impl Report, format: OutputFormat) -> CliResult<()> {
    print!("{}", format_report(report, format)?);
    Ok(())
}

pub(crate) fn format_report(report: &impl Report, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => {
            let text = serde_json::to_string_pretty(report)
                .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
            Ok(format!("{text}\n"))
        }
        OutputFormat::Table => Ok(report
            .table_lines()
            .into_iter()
            .map(|line| line + "\n")
            .collect()),
    }
}

pub(crate) fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{label:<24} {value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
    }

    impl Report for Sample {
        fn table_lines(&self) -> Vec<String> {
            vec![field("name:", self.name)]
        }
    }

    #[test]
    fn formats_both_layouts() -> Result<(), Box<dyn std::error::Error>> {
        let sample = Sample { name: "boot" };
        let json: serde_json::Value =
            serde_json::from_str(&format_report(&sample, OutputFormat::Json)?)?;
        assert_eq!(json["name"], "boot");
        let table = format_report(&sample, OutputFormat::Table)?;
        assert!(table.starts_with("name:"));
        assert!(table.trim_end().ends_with("boot"));
        Ok(())
    }
}
