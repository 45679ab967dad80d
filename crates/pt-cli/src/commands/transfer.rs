//! Export and import of the whole ledger.

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use clap::Args;
use pt_db::{Database, ImportMode, LedgerExport};

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Write to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Export file to read; `-` reads stdin.
    pub input: PathBuf,

    /// merge keeps existing rows; replace clears them first.
    #[arg(long, default_value = "merge")]
    pub mode: ImportMode,
}

pub fn export<W: Write>(
    writer: &mut W,
    db: &Database,
    args: &ExportArgs,
    timezone: &str,
    exported_at: &DateTime<FixedOffset>,
) -> Result<()> {
    let export = db
        .export_ledger(timezone, exported_at)
        .context("failed to export ledger")?;
    let json = export.to_json_pretty()?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), segments = export.segments.len(), "exported ledger");
        }
        None => writeln!(writer, "{json}")?,
    }
    Ok(())
}

pub fn import<W: Write, R: Read>(
    writer: &mut W,
    stdin: R,
    db: &mut Database,
    args: &ImportArgs,
) -> Result<()> {
    let text = if args.input.as_os_str() == "-" {
        let mut text = String::new();
        let mut stdin = stdin;
        stdin
            .read_to_string(&mut text)
            .context("failed to read export from stdin")?;
        text
    } else {
        std::fs::read_to_string(&args.input)
            .with_context(|| format!("failed to read {}", args.input.display()))?
    };
    let export = LedgerExport::from_json(&text).context("failed to parse export")?;
    let stats = db
        .import_ledger(&export, args.mode)
        .context("failed to import ledger")?;

    writeln!(writer, "Imported ({} mode):", args.mode)?;
    writeln!(
        writer,
        "  segments: {} new, {} already present",
        stats.segments, stats.duplicates
    )?;
    writeln!(writer, "  filter entries: {}", stats.filter_entries)?;
    writeln!(writer, "  display mappings: {}", stats.mappings)?;
    writeln!(writer, "  finished markers: {}", stats.finished_markers)?;
    writeln!(writer, "  first-launch overrides: {}", stats.first_launch_overrides)?;
    if stats.skipped > 0 {
        writeln!(writer, "  skipped invalid rows: {}", stats.skipped)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use pt_core::{FilterKind, RawIdentity};
    use pt_db::FilterAction;

    fn at(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn export_file_imports_into_another_ledger() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ledger.json");

        let mut source = Database::open_in_memory().unwrap();
        source
            .record_session(
                &RawIdentity::new("X").unwrap(),
                &at("2024-03-10T23:00:00+01:00"),
                &at("2024-03-11T01:30:00+01:00"),
            )
            .unwrap();
        source
            .set_filter("launcher.exe", FilterKind::Blacklist, FilterAction::Add)
            .unwrap();
        let mut output = Vec::new();
        export(
            &mut output,
            &source,
            &ExportArgs {
                output: Some(path.clone()),
            },
            "Europe/Paris",
            &at("2024-04-01T12:00:00+02:00"),
        )
        .unwrap();
        assert!(output.is_empty());

        let mut target = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        import(
            &mut output,
            std::io::empty(),
            &mut target,
            &ImportArgs {
                input: path,
                mode: ImportMode::Merge,
            },
        )
        .unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Imported (merge mode):
          segments: 2 new, 0 already present
          filter entries: 1
          display mappings: 0
          finished markers: 0
          first-launch overrides: 0
        ");
        assert_eq!(target.list_segments().unwrap().len(), 2);
    }

    #[test]
    fn import_reads_stdin_and_reports_skips() {
        let payload = r#"{
            "meta": {"schema_version": 8, "exported_at": "2024-04-01T12:00:00+00:00", "timezone": "utc"},
            "segments": [
                {"raw_identity": "X", "start_time": "2024-03-10T10:00:00+00:00", "end_time": "2024-03-10T11:00:00+00:00"},
                {"raw_identity": "Y", "start_time": "not a time", "end_time": "2024-03-10T11:00:00+00:00"}
            ]
        }"#;
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        import(
            &mut output,
            payload.as_bytes(),
            &mut db,
            &ImportArgs {
                input: PathBuf::from("-"),
                mode: ImportMode::Replace,
            },
        )
        .unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Imported (replace mode):"));
        assert!(output.contains("skipped invalid rows: 1"));
    }

    #[test]
    fn malformed_export_is_an_error() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let result = import(
            &mut output,
            "[1, 2, 3]".as_bytes(),
            &mut db,
            &ImportArgs {
                input: PathBuf::from("-"),
                mode: ImportMode::Merge,
            },
        );
        assert!(result.is_err());
    }
}
