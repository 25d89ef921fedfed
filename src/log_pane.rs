//! A bounded, levelled log view that mirrors every line to the process log.

use std::{collections::VecDeque, fmt, io::Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    /// Local wall-clock time as `HH:MM:SS`, when timestamps are enabled.
    pub timestamp: Option<String>,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(timestamp) = &self.timestamp {
            write!(f, "[{timestamp}] ")?;
        }
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Keeps the most recent `capacity` lines, optionally echoing each to a writer.
pub struct LogPane {
    lines: VecDeque<LogLine>,
    capacity: usize,
    show_timestamps: bool,
    sink: Option<Box<dyn Write + Send>>,
}

impl fmt::Debug for LogPane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogPane")
            .field("lines", &self.lines.len())
            .field("capacity", &self.capacity)
            .field("show_timestamps", &self.show_timestamps)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl Default for LogPane {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl LogPane {
    /// A pane holding at most `capacity` lines (at least one), with timestamps on.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity.min(1_024)),
            capacity,
            show_timestamps: true,
            sink: None,
        }
    }

    pub fn with_timestamps(mut self, show: bool) -> Self {
        self.show_timestamps = show;
        self
    }

    /// Also writes each rendered line to `sink`.
    ///
    /// A write error detaches the sink; the pane keeps working.
    pub fn with_sink(mut self, sink: impl Write + Send + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Appends an `INFO` line.
    pub fn info(&mut self, message: impl Into<String>) {
        self.append(Level::Info, message.into());
    }

    /// Appends a `WARN` line.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.append(Level::Warn, message.into());
    }

    /// Appends an `ERROR` line.
    pub fn error(&mut self, message: impl Into<String>) {
        self.append(Level::Error, message.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// All retained lines, oldest first, newline separated.
    pub fn render(&self) -> String {
        self.lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn append(&mut self, level: Level, message: String) {
        #[cfg(feature = "tracing")]
        match level {
            Level::Info => tracing::info!(target: "log_pane", "{message}"),
            Level::Warn => tracing::warn!(target: "log_pane", "{message}"),
            Level::Error => tracing::error!(target: "log_pane", "{message}"),
        }

        let line = LogLine {
            level,
            timestamp: self
                .show_timestamps
                .then(|| chrono::Local::now().format("%H:%M:%S").to_string()),
            message,
        };

        if let Some(sink) = self.sink.as_mut() {
            if let Err(_err) = writeln!(sink, "{line}") {
                #[cfg(feature = "tracing")]
                tracing::warn!("log pane sink failed, detaching: {_err}");
                self.sink = None;
            }
        }

        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }
}
