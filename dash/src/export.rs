//! Export of the full reporting view.

use crate::error::{Error, Result};
use crate::types::Issue;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Exporter receives the reporting view, row for row.
pub trait Exporter {
    fn export(&self, rows: &[Issue]) -> Result<()>;
}

/// Write one JSON object per line.
pub fn write_jsonl<W: Write>(mut writer: W, rows: &[Issue]) -> Result<()> {
    for row in rows {
        serde_json::to_writer(&mut writer, row).map_err(|e| Error::Export(format!("{}: {}", row.key, e)))?;
        writer.write_all(b"\n").map_err(|e| Error::Export(e.to_string()))?;
    }
    writer.flush().map_err(|e| Error::Export(e.to_string()))
}

/// JsonlExporter writes issues to a `.jsonl` file, replacing it
#[derive(Debug, Clone)]
pub struct JsonlExporter {
    path: PathBuf,
}

impl JsonlExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonlExporter { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Exporter for JsonlExporter {
    fn export(&self, rows: &[Issue]) -> Result<()> {
        let file = File::create(&self.path)
            .map_err(|e| Error::Export(format!("cannot create {}: {}", self.path.display(), e)))?;
        write_jsonl(BufWriter::new(file), rows)?;
        info!("exported {} issues to {}", rows.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fixtures::{done, issue};
    use std::io::{BufRead, BufReader};

    #[test]
    fn one_line_per_issue() {
        let rows = vec![issue("A-1", "2024-01-01"), done("A-2", "2024-01-01", "2024-01-03")];
        let mut buf = Vec::new();
        write_jsonl(&mut buf, &rows).unwrap();

        let lines: Vec<String> = BufReader::new(buf.as_slice()).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 2);
        let second: Issue = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(second, rows[1]);
    }

    #[test]
    fn exports_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonlExporter::new(dir.path().join("out.jsonl"));
        exporter.export(&[issue("A-1", "2024-01-01")]).unwrap();

        let text = std::fs::read_to_string(exporter.path()).unwrap();
        assert!(text.starts_with("{\"key\":\"A-1\""));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn unwritable_path_is_an_export_error() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = JsonlExporter::new(dir.path().join("missing").join("out.jsonl"));
        let err = exporter.export(&[]).unwrap_err();
        assert!(matches!(err, Error::Export(_)));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writer_failure_is_an_export_error() {
        let err = write_jsonl(FailingWriter, &[issue("A-1", "2024-01-01")]).unwrap_err();
        assert!(matches!(err, Error::Export(_)));
    }
}
