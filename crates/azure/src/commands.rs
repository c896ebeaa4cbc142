//! `##vso[...]` logging commands.
//!
//! The agent scans task stdout for lines of the form
//! `##vso[area.action key=value;...]message`.

use qodana_ci_core::{Error, Result};
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Escape a command message.
#[must_use]
pub fn escape_message(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a property value; `;` and `]` also terminate properties.
#[must_use]
pub fn escape_property(value: &str) -> String {
    escape_message(value)
        .replace(';', "%3B")
        .replace(']', "%5D")
}

/// Format one logging command line.
#[must_use]
pub fn format_command(command: &str, properties: &[(&str, &str)], message: &str) -> String {
    let props: String = properties
        .iter()
        .map(|(k, v)| format!("{k}={};", escape_property(v)))
        .collect();
    let props = if props.is_empty() {
        String::new()
    } else {
        format!(" {props}")
    };
    format!("##vso[{command}{props}]{}", escape_message(message))
}

/// Shared sink for logging commands; stdout on a real agent.
#[derive(Clone)]
pub struct LoggingCommands {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LoggingCommands {
    /// Commands written to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Commands written to `out`.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    /// Issue `command` with `properties` and `message`.
    pub fn issue(&self, command: &str, properties: &[(&str, &str)], message: &str) -> Result<()> {
        let line = format_command(command, properties, message);
        let mut out = self
            .out
            .lock()
            .map_err(|_| Error::host("runner", "logging command output lock poisoned"))?;
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// In-memory command sink.
    #[derive(Clone, Default)]
    pub struct Captured(pub Arc<Mutex<Vec<u8>>>);

    impl Captured {
        pub fn commands(&self) -> LoggingCommands {
            LoggingCommands::new(Box::new(self.clone()))
        }

        pub fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
