//! Ingestion of user-supplied proxy lists.
//!
//! Converts a `.txt` or `.csv` export into normalized candidates. CSV
//! columns are located by header name, with an optional datacenter filter.

use crate::error::{Error, Result};
use crate::probe::Candidate;
use std::path::Path;

const IP_HEADERS: &[&str] = &["ip", "ip地址", "ip 地址", "ip address", "ip_address"];
const PORT_HEADERS: &[&str] = &["port", "端口", "端口号"];
const DATACENTER_HEADERS: &[&str] = &[
    "datacenter",
    "数据中心",
    "数据中心名称",
    "datacenter name",
    "provider",
];

/// Supported input formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Txt,
    Csv,
}

impl InputFormat {
    /// Detect the format from the file extension.
    ///
    /// # Errors
    ///
    /// Returns a parse error for any extension other than `.txt` / `.csv`.
    pub fn detect(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(Self::Txt),
            "csv" => Ok(Self::Csv),
            _ => Err(Error::parse(format!(
                "unsupported input format `.{ext}`, use a .csv or .txt file"
            ))),
        }
    }
}

/// Result of ingesting one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Extracted candidates, in file order
    pub candidates: Vec<Candidate>,
    /// Rows skipped by the datacenter filter
    pub filtered: usize,
}

/// Read and normalize an input file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has an unsupported format,
/// or yields no candidates.
pub fn ingest_file(path: &Path, datacenter: Option<&str>) -> Result<IngestReport> {
    let format = InputFormat::detect(path)?;
    let content = std::fs::read_to_string(path)?;

    let report = match format {
        InputFormat::Txt => {
            if datacenter.is_some() {
                tracing::warn!("datacenter filter is ignored for .txt input");
            }
            IngestReport {
                candidates: parse_txt(&content),
                filtered: 0,
            }
        }
        InputFormat::Csv => parse_csv(&content, datacenter)?,
    };

    if report.candidates.is_empty() {
        return Err(Error::no_candidates(path.display()));
    }
    tracing::info!(
        "extracted {} candidates from {}",
        report.candidates.len(),
        path.display()
    );
    Ok(report)
}

/// Parse `host port` or `host:port` lines; other lines are skipped.
#[must_use]
pub fn parse_txt(content: &str) -> Vec<Candidate> {
    content
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let mut parts: Vec<&str> = if line.contains(char::is_whitespace) {
                line.split_whitespace().collect()
            } else if line.contains(':') {
                line.split(':').collect()
            } else {
                return None;
            };
            parts.truncate(2);
            match parts.as_slice() {
                [host, port] if !host.is_empty() && !port.is_empty() => {
                    Some(Candidate::new(*host, *port))
                }
                _ => None,
            }
        })
        .collect()
}

/// Parse a CSV export with a header row.
///
/// # Errors
///
/// Returns a parse error if the file has no header row or too few columns
/// to locate an IP and a port.
pub fn parse_csv(content: &str, datacenter: Option<&str>) -> Result<IngestReport> {
    let mut rows = csv_records(content.trim_start_matches('\u{feff}')).into_iter();
    let headers = rows.next().ok_or_else(|| Error::parse("CSV file is empty"))?;

    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
    };

    let ip_idx = find(IP_HEADERS).or_else(|| {
        tracing::warn!("no IP column found, using first column `{}`", headers[0]);
        Some(0)
    });
    let port_idx = find(PORT_HEADERS).or_else(|| {
        let fallback = headers.get(1)?;
        tracing::warn!("no port column found, using second column `{fallback}`");
        Some(1)
    });
    let (Some(ip_idx), Some(port_idx)) = (ip_idx, port_idx) else {
        return Err(Error::parse("CSV has no `ip` and `port` columns"));
    };

    let dc_idx = match (datacenter, find(DATACENTER_HEADERS)) {
        (Some(dc), None) => {
            tracing::warn!(
                "datacenter filter `{dc}` set but no datacenter column in {:?}; not filtering",
                headers
            );
            None
        }
        (Some(dc), Some(idx)) => Some((dc, idx)),
        (None, _) => None,
    };

    let mut report = IngestReport::default();
    for row in rows {
        let (Some(ip), Some(port)) = (row.get(ip_idx), row.get(port_idx)) else {
            continue;
        };
        let (ip, port) = (ip.trim(), port.trim());
        if ip.is_empty() || port.is_empty() {
            continue;
        }
        if let Some((dc, idx)) = dc_idx {
            if row.get(idx).map(|v| v.trim()) != Some(dc) {
                report.filtered += 1;
                continue;
            }
        }
        report.candidates.push(Candidate::new(ip, port));
    }

    if let Some((dc, _)) = dc_idx {
        tracing::info!("datacenter `{dc}` filter skipped {} rows", report.filtered);
    }
    Ok(report)
}

/// Split CSV content into records, honouring double-quoted fields.
///
/// Quoted fields may contain commas, doubled quotes and line breaks.
/// Blank lines yield no record.
#[must_use]
pub fn csv_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => record.push(std::mem::take(&mut field)),
            '\r' if !quoted => {}
            '\n' if !quoted => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }
    records
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    let blank = matches!(record.as_slice(), [only] if only.trim().is_empty());
    if !blank {
        records.push(record);
    }
}
