// Delimited-text sources of unknown delimiter and encoding, and atomic
// writers for the artifacts the pipeline stages persist.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Delimiters tried when sniffing a source, in tie-break order.
pub const DELIMITER_CANDIDATES: &[u8] = b",;\t|";

/// How many non-empty lines the sniffer inspects.
const SNIFF_LINES: usize = 10;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("{path} contains no header row")]
    Empty { path: String },

    #[error("{path} is missing required column `{column}`")]
    MissingColumn { path: String, column: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Text encoding a source was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1, used when the bytes are not valid UTF-8.
    Latin1,
}

/// Decode raw bytes as UTF-8 (dropping a leading BOM), falling back to
/// Latin-1 where every byte maps to the code point of the same value.
pub fn decode(bytes: &[u8]) -> (String, TextEncoding) {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_string(), TextEncoding::Utf8),
        Err(_) => (
            bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Latin1,
        ),
    }
}

// ---------------------------------------------------------------------------
// Delimiter sniffing
// ---------------------------------------------------------------------------

/// Count occurrences of `delimiter` outside double-quoted fields.
fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Pick the delimiter for `text` among [`DELIMITER_CANDIDATES`].
///
/// A candidate that appears in the header and splits every sampled line
/// into the same number of fields wins over one that does not; among equals
/// the higher header count wins, then the earlier candidate. Falls back to
/// `,` when no candidate appears in the header at all.
pub fn sniff_delimiter(text: &str) -> u8 {
    let lines: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();
    let Some(header) = lines.first() else {
        return b',';
    };

    let mut best: Option<(bool, usize, u8)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let header_count = count_unquoted(header, candidate);
        if header_count == 0 {
            continue;
        }
        let consistent = lines[1..]
            .iter()
            .all(|l| count_unquoted(l, candidate) == header_count);
        let better = match best {
            None => true,
            Some((best_consistent, best_count, _)) => {
                (consistent, header_count) > (best_consistent, best_count)
            }
        };
        if better {
            best = Some((consistent, header_count, candidate));
        }
    }

    best.map(|(_, _, d)| d).unwrap_or(b',')
}

// ---------------------------------------------------------------------------
// Sniffed source
// ---------------------------------------------------------------------------

/// A decoded source with its detected delimiter, ready to hand out CSV
/// readers for typed deserialization.
#[derive(Debug, Clone)]
pub struct SniffedSource {
    pub path: PathBuf,
    pub delimiter: u8,
    pub encoding: TextEncoding,
    text: String,
}

impl SniffedSource {
    /// Build from in-memory text. `path` is only used in diagnostics.
    pub fn from_text(path: impl Into<PathBuf>, text: String, encoding: TextEncoding) -> Self {
        let delimiter = sniff_delimiter(&text);
        Self {
            path: path.into(),
            delimiter,
            encoding,
            text,
        }
    }

    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Self {
        let (text, encoding) = decode(bytes);
        Self::from_text(path, text, encoding)
    }

    /// Read a file from disk. A missing or unreadable file is an error;
    /// a file with no header line is an error.
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let bytes = std::fs::read(path).map_err(|e| TableError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let source = Self::from_bytes(path, &bytes);
        if source.encoding == TextEncoding::Latin1 {
            warn!("{} is not valid UTF-8; decoded as Latin-1", path.display());
        }
        if source.text.trim().is_empty() {
            return Err(TableError::Empty {
                path: path.display().to_string(),
            });
        }
        debug!(
            "opened {} (delimiter {:?}, {:?})",
            path.display(),
            char::from(source.delimiter),
            source.encoding
        );
        Ok(source)
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// A fresh CSV reader over the decoded text. Headers and fields are
    /// trimmed and ragged rows are tolerated so they can be skipped row by row.
    pub fn reader(&self) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(self.text.as_bytes())
    }

    /// The trimmed header row.
    pub fn headers(&self) -> Result<Vec<String>, TableError> {
        let mut reader = self.reader();
        let headers = reader.headers().map_err(|e| TableError::Csv {
            path: self.display_path(),
            source: e,
        })?;
        if headers.iter().all(|h| h.is_empty()) {
            return Err(TableError::Empty {
                path: self.display_path(),
            });
        }
        Ok(headers.iter().map(str::to_string).collect())
    }

    /// Fail with [`TableError::MissingColumn`] unless every column in
    /// `required` is present.
    pub fn require_columns(&self, required: &[&str]) -> Result<Vec<String>, TableError> {
        let headers = self.headers()?;
        for column in required {
            if !headers.iter().any(|h| h == column) {
                return Err(TableError::MissingColumn {
                    path: self.display_path(),
                    column: column.to_string(),
                });
            }
        }
        Ok(headers)
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

/// Write `contents` to a sibling temp file and rename it over `path`, so a
/// failed write never leaves a partial artifact behind.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), TableError> {
    let err = |e: std::io::Error| TableError::Write {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(err)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let result = std::fs::File::create(&tmp)
        .and_then(|mut f| {
            f.write_all(contents)?;
            f.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(err(e));
    }
    Ok(())
}

/// Serialize a header row plus string rows as comma-delimited UTF-8 and
/// persist it with [`write_atomic`].
pub fn write_table(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<(), TableError> {
    let csv_err = |e: csv::Error| TableError::Csv {
        path: path.display().to_string(),
        source: e,
    };
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers).map_err(csv_err)?;
    for row in rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    let bytes = writer.into_inner().map_err(|e| TableError::Write {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    })?;
    write_atomic(path, &bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
