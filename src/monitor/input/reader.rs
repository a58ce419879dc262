// SPDX-License-Identifier: Apache-2.0

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::monitor::error::{Error, Result};

/// Initial capacity of the per-line buffer
const LINE_BUFFER_CAPACITY: usize = 1024;

/// Outcome of a completed scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSummary {
    /// Byte offset immediately after the last line consumed
    pub end_offset: u64,
    /// Number of lines delivered to the callback
    pub lines: u64,
}

/// LineScanner reads a file line by line from a starting offset to EOF.
///
/// The scanner owns its file handle and is consumed by [`LineScanner::scan_from`],
/// so the handle is closed on every exit path.
pub struct LineScanner {
    /// Path to the file (for errors and logging)
    path: PathBuf,
    /// The open file handle
    file: File,
}

impl LineScanner {
    /// Open a file for scanning
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| Error::FileNotReadable {
            path: path.clone(),
            source,
        })?;

        Ok(Self { path, file })
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current length of the file in bytes
    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|source| self.read_error(source))
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Seek to `offset` and hand every line up to EOF to `on_line`.
    ///
    /// Lines end at `\n`; a trailing `\r` is stripped as well. A final line
    /// without a terminator is still delivered. Invalid UTF-8 is replaced
    /// rather than skipped. The first error from `on_line` stops the scan.
    pub fn scan_from<F>(self, offset: u64, mut on_line: F) -> Result<ScanSummary>
    where
        F: FnMut(&str) -> Result<()>,
    {
        let len = self.len()?;
        if offset > len {
            return Err(Error::OffsetBeyondEnd { offset, len });
        }

        let Self { path, mut file } = self;
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| Error::Read {
                path: path.clone(),
                source,
            })?;

        let mut reader = BufReader::new(file);
        let mut buf = Vec::with_capacity(LINE_BUFFER_CAPACITY);
        let mut current_offset = offset;
        let mut lines = 0u64;

        loop {
            buf.clear();
            let bytes_read = match reader.read_until(b'\n', &mut buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(Error::Read {
                        path: path.clone(),
                        source,
                    });
                }
            };
            if bytes_read == 0 {
                break;
            }

            current_offset += bytes_read as u64;
            lines += 1;

            let line = String::from_utf8_lossy(trim_line_ending(&buf));
            on_line(&line)?;
        }

        Ok(ScanSummary {
            end_offset: current_offset,
            lines,
        })
    }

    fn read_error(&self, source: io::Error) -> Error {
        Error::Read {
            path: self.path.clone(),
            source,
        }
    }
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn collect(path: &Path, offset: u64) -> Result<(Vec<String>, ScanSummary)> {
        let mut lines = Vec::new();
        let summary = LineScanner::open(path)?.scan_from(offset, |line| {
            lines.push(line.to_string());
            Ok(())
        })?;
        Ok((lines, summary))
    }

    #[test]
    fn test_scan_reads_all_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "line 1").unwrap();
        writeln!(file, "line 2").unwrap();
        writeln!(file, "line 3").unwrap();
        file.flush().unwrap();

        let (lines, summary) = collect(file.path(), 0).unwrap();
        assert_eq!(lines, vec!["line 1", "line 2", "line 3"]);
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.end_offset, 21);
    }

    #[test]
    fn test_scan_resumes_from_offset() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "line 1").unwrap();
        file.flush().unwrap();

        let (_, first) = collect(file.path(), 0).unwrap();

        writeln!(file, "line 2").unwrap();
        file.flush().unwrap();

        let (lines, second) = collect(file.path(), first.end_offset).unwrap();
        assert_eq!(lines, vec!["line 2"]);
        assert_eq!(second.end_offset, 14);
    }

    #[test]
    fn test_scan_at_end_reads_nothing() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "only line\n").unwrap();
        file.flush().unwrap();

        let (lines, summary) = collect(file.path(), 10).unwrap();
        assert!(lines.is_empty());
        assert_eq!(summary, ScanSummary { end_offset: 10, lines: 0 });
    }

    #[test]
    fn test_scan_handles_crlf_and_unterminated_line() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "first\r\nsecond\r\npartial").unwrap();
        file.flush().unwrap();

        let (lines, summary) = collect(file.path(), 0).unwrap();
        assert_eq!(lines, vec!["first", "second", "partial"]);
        assert_eq!(summary.end_offset, 22);
    }

    #[test]
    fn test_scan_keeps_blank_and_invalid_utf8_lines() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"\n\xffbad\nok\n").unwrap();
        file.flush().unwrap();

        let (lines, summary) = collect(file.path(), 0).unwrap();
        assert_eq!(lines, vec!["", "\u{fffd}bad", "ok"]);
        assert_eq!(summary.lines, 3);
    }

    #[test]
    fn test_offset_beyond_end() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "short\n").unwrap();
        file.flush().unwrap();

        let result = collect(file.path(), 100);
        assert!(matches!(
            result,
            Err(Error::OffsetBeyondEnd { offset: 100, len: 6 })
        ));
    }

    #[test]
    fn test_callback_error_stops_scan() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "a\nb\nc\n").unwrap();
        file.flush().unwrap();

        let mut seen = 0;
        let result = LineScanner::open(file.path())
            .unwrap()
            .scan_from(0, |_| {
                seen += 1;
                if seen == 2 {
                    return Err(Error::Config("stop".to_string()));
                }
                Ok(())
            });

        assert!(result.is_err());
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = LineScanner::open(dir.path().join("missing.log"));
        assert!(matches!(result, Err(Error::FileNotReadable { .. })));
    }

    #[test]
    fn test_len() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "12345").unwrap();
        file.flush().unwrap();

        let scanner = LineScanner::open(file.path()).unwrap();
        assert_eq!(scanner.len().unwrap(), 5);
        assert!(!scanner.is_empty().unwrap());
        assert_eq!(scanner.path(), file.path());
    }

    #[test]
    fn test_lines_appended_during_scan_are_read() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "line 1\nline 2\n").unwrap();
        file.flush().unwrap();

        let scanner = LineScanner::open(file.path()).unwrap();
        let measured = scanner.len().unwrap();

        let mut lines = Vec::new();
        let summary = scanner
            .scan_from(0, |line| {
                if lines.is_empty() {
                    let mut writer = std::fs::OpenOptions::new()
                        .append(true)
                        .open(file.path())
                        .unwrap();
                    writer.write_all(b"line 3\n").unwrap();
                }
                lines.push(line.to_string());
                Ok(())
            })
            .unwrap();

        // The size taken before the scan stays the reported file size while
        // the scan runs on to the new EOF
        assert_eq!(measured, 14);
        assert_eq!(lines, vec!["line 1", "line 2", "line 3"]);
        assert_eq!(summary.end_offset, 21);
        assert!(summary.end_offset > measured);
    }
}
