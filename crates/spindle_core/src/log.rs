//! Per-test output buffer.

use std::fmt;
use std::io;

/// Output captured for one test.
///
/// A test method that declares a `&mut TestLog` parameter writes its diagnostic output here; the engine attaches the
/// text to the test's result record. Each worker owns its own log, so writing never contends.
#[derive(Debug, Default, Clone)]
pub struct TestLog {
    buf: String,
}

impl TestLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line.
    pub fn line(&mut self, text: impl AsRef<str>) {
        self.buf.push_str(text.as_ref());
        self.buf.push('\n');
    }

    pub fn contents(&self) -> &str {
        &self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

impl fmt::Write for TestLog {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

impl io::Write for TestLog {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_write() {
        use std::fmt::Write as _;
        let mut log = TestLog::new();
        writeln!(log, "Hello from {}", "Logging_test").unwrap();
        assert_eq!(log.contents(), "Hello from Logging_test\n");
    }

    #[test]
    fn test_io_write() {
        use std::io::Write as _;
        let mut log = TestLog::new();
        log.write_all(b"raw bytes").unwrap();
        assert_eq!(log.into_string(), "raw bytes");
    }

    #[test]
    fn test_line() {
        let mut log = TestLog::new();
        assert!(log.is_empty());
        log.line("a");
        log.line(String::from("b"));
        assert_eq!(log.contents(), "a\nb\n");
    }
}
