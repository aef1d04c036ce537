use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use voxtrigger_core::{KeywordEvent, SinkError};

/// Append-only log of final transcripts and keyword detections.
pub struct TranscriptFile {
    path: PathBuf,
    file: File,
    lines_written: usize,
}

impl TranscriptFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::Open(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            path,
            file,
            lines_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn write_final_text(&mut self, text: &str) -> Result<(), SinkError> {
        self.write_line(&format!("text\t{text}"))
    }

    pub fn write_keyword(&mut self, event: &KeywordEvent) -> Result<(), SinkError> {
        let kind = if event.is_partial { "partial" } else { "keyword" };
        self.write_line(&format!("{kind}\t{}\t{:.2}", event.keyword, event.confidence))
    }

    fn write_line(&mut self, line: &str) -> Result<(), SinkError> {
        writeln!(self.file, "{line}").map_err(|e| SinkError::Write(e.to_string()))?;
        self.lines_written += 1;
        Ok(())
    }
}
