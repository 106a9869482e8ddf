//! CI service-message sections
//!
//! The CI log folds everything between `##teamcity[blockOpened name='x']`
//! and `##teamcity[blockClosed name='x']` into one collapsible block. A
//! [`Section`] guard closes its block when dropped, so a block is closed even
//! when the code inside it fails.

use buildkick_redaction::CredentialRedactor;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Escape a value for use inside a service message attribute.
#[must_use]
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => out.push_str("||"),
            '\'' => out.push_str("|'"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            '\u{0085}' => out.push_str("|x"),
            '\u{2028}' => out.push_str("|l"),
            '\u{2029}' => out.push_str("|p"),
            _ => out.push(c),
        }
    }
    out
}

/// Writes service messages to the console (or any writer in tests).
pub struct ServiceMessages {
    out: Mutex<Box<dyn Write + Send>>,
    redactor: CredentialRedactor,
}

impl fmt::Debug for ServiceMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceMessages").finish_non_exhaustive()
    }
}

impl ServiceMessages {
    #[must_use]
    pub fn stdout(redactor: CredentialRedactor) -> Self {
        Self::with_writer(io::stdout(), redactor)
    }

    #[must_use]
    pub fn with_writer(writer: impl Write + Send + 'static, redactor: CredentialRedactor) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
            redactor,
        }
    }

    /// Open a block; it closes when the returned guard is dropped.
    #[must_use = "the block closes as soon as the section is dropped"]
    pub fn section(&self, name: impl Into<String>) -> Section<'_> {
        let name = name.into();
        self.emit("blockOpened", &name);
        Section {
            messages: self,
            name,
        }
    }

    /// Print `lines` inside a block of their own.
    pub fn section_with_lines<I>(&self, name: &str, lines: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let _section = self.section(name);
        for line in lines {
            self.write_line(line.as_ref());
        }
    }

    /// Plain console line, redacted.
    pub fn write_line(&self, line: &str) {
        let line = self.redactor.redact(line);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // Best effort: write errors on the console are ignored.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }

    fn emit(&self, message: &str, name: &str) {
        let name = escape_value(&self.redactor.redact(name));
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(out, "##teamcity[{message} name='{name}']");
        let _ = out.flush();
    }
}

/// An open block.
pub struct Section<'a> {
    messages: &'a ServiceMessages,
    name: String,
}

impl Section<'_> {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        self.messages.emit("blockClosed", &self.name);
    }
}

/// In-memory writer whose contents can be read back while shared.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contents(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
