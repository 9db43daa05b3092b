//! Report Writer
//!
//! Single writer for the text report. Every line goes to the report sink and,
//! when echo is enabled, to stdout. The sink is flushed after each line so an
//! interrupted run leaves a readable partial report.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Tee writer passed by `&mut` into each pipeline stage
pub struct ReportWriter {
    sink: Box<dyn Write>,
    /// Console mirror; dropped once the reader side has gone away
    console: Option<Box<dyn Write>>,
}

impl ReportWriter {
    /// Wrap any sink (a `Vec<u8>` in tests, a `File` in runs), mirroring to
    /// stdout when `echo` is set
    pub fn new<W: Write + 'static>(sink: W, echo: bool) -> Self {
        if echo {
            return Self::with_console(sink, io::stdout());
        }
        Self {
            sink: Box::new(sink),
            console: None,
        }
    }

    /// Wrap a sink with an explicit console mirror
    pub fn with_console<W, C>(sink: W, console: C) -> Self
    where
        W: Write + 'static,
        C: Write + 'static,
    {
        Self {
            sink: Box::new(sink),
            console: Some(Box::new(console)),
        }
    }

    /// Open the report file, truncating unless `append` is set
    pub fn create(path: &Path, append: bool, echo: bool) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report directory: {:?}", parent))?;
        }

        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)
            .with_context(|| format!("Failed to open report file: {:?}", path))?;

        Ok(Self::new(file, echo))
    }

    /// Write one line to both destinations and flush
    ///
    /// A closed console (`| head`) stops the mirror; the report file keeps
    /// receiving every line.
    pub fn line(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        let text = text.as_ref();
        self.echo(text)?;
        writeln!(self.sink, "{}", text)?;
        self.sink.flush()
    }

    pub fn blank(&mut self) -> io::Result<()> {
        self.line("")
    }

    /// Write a multi-line block one line at a time
    pub fn block(&mut self, text: &str) -> io::Result<()> {
        for line in text.lines() {
            self.line(line)?;
        }
        Ok(())
    }

    fn echo(&mut self, text: &str) -> io::Result<()> {
        let Some(console) = self.console.as_mut() else {
            return Ok(());
        };
        match writeln!(console, "{}", text).and_then(|_| console.flush()) {
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!("console closed, report continues to file only");
                self.console = None;
                Ok(())
            }
            other => other,
        }
    }
}
