//! Source file selection and destination naming.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};

use mft_core::error::AppError;
use mft_core::result::AppResult;

/// Glob filter applied to source file names.
///
/// Several globs may be given separated by commas (`*.csv, *.txt`). An empty
/// pattern matches every file.
#[derive(Debug, Clone)]
pub struct FilePattern {
    globset: Option<GlobSet>,
    raw: String,
}

impl FilePattern {
    /// Compile a pattern. `None` or blank matches everything.
    pub fn new(pattern: Option<&str>) -> AppResult<Self> {
        let raw = pattern.unwrap_or("").trim().to_string();
        let globs: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .collect();
        if globs.is_empty() {
            return Ok(Self { globset: None, raw });
        }

        let mut builder = GlobSetBuilder::new();
        for glob in globs {
            let glob = Glob::new(glob).map_err(|e| {
                AppError::validation(format!("Invalid file pattern '{glob}': {e}"))
            })?;
            builder.add(glob);
        }
        let globset = builder
            .build()
            .map_err(|e| AppError::validation(format!("Invalid file pattern '{raw}': {e}")))?;

        Ok(Self {
            globset: Some(globset),
            raw,
        })
    }

    /// Whether a file name is selected.
    pub fn matches(&self, file_name: &str) -> bool {
        match &self.globset {
            Some(set) => set.is_match(file_name),
            None => true,
        }
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    FileName,
    Name,
    Ext,
    Date(String),
    Timestamp,
}

/// Template for destination file names.
///
/// Variables: `${filename}`, `${name}` (without extension), `${ext}`
/// (without dot), `${date:FMT}` (strftime format) and `${timestamp}`
/// (`YYYYMMDD_HHMMSS`). An empty template keeps the original name. A
/// template must contain `${filename}` or `${name}` so that files of one
/// config never share a destination name.
#[derive(Debug, Clone)]
pub struct OutputPattern {
    segments: Vec<Segment>,
}

impl OutputPattern {
    /// Parse a template. Unknown variables, invalid date formats and
    /// templates without a per-file variable are rejected.
    pub fn new(pattern: Option<&str>) -> AppResult<Self> {
        let raw = pattern.unwrap_or("").trim();
        if raw.is_empty() {
            return Ok(Self {
                segments: vec![Segment::FileName],
            });
        }

        let mut segments = Vec::new();
        let mut rest = raw;
        while let Some(start) = rest.find("${") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after.find('}').ok_or_else(|| {
                AppError::validation(format!("Unterminated variable in output pattern '{raw}'"))
            })?;
            segments.push(parse_variable(&after[..end], raw)?);
            rest = &after[end + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        if !segments
            .iter()
            .any(|s| matches!(s, Segment::FileName | Segment::Name))
        {
            return Err(AppError::validation(format!(
                "Output pattern '{raw}' must contain ${{filename}} or ${{name}}"
            )));
        }
        Ok(Self { segments })
    }

    /// Render the destination name for a source file.
    pub fn render(&self, file_name: &str, now: DateTime<Utc>) -> String {
        let (stem, ext) = split_name(file_name);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::FileName => out.push_str(file_name),
                Segment::Name => out.push_str(stem),
                Segment::Ext => out.push_str(ext),
                Segment::Date(fmt) => out.push_str(&now.format(fmt).to_string()),
                Segment::Timestamp => out.push_str(&now.format("%Y%m%d_%H%M%S").to_string()),
            }
        }
        out
    }
}

fn parse_variable(var: &str, raw: &str) -> AppResult<Segment> {
    match var {
        "filename" => Ok(Segment::FileName),
        "name" => Ok(Segment::Name),
        "ext" => Ok(Segment::Ext),
        "timestamp" => Ok(Segment::Timestamp),
        _ => match var.strip_prefix("date:") {
            Some(fmt) if !fmt.is_empty() => {
                if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                    return Err(AppError::validation(format!(
                        "Invalid date format '{fmt}' in output pattern '{raw}'"
                    )));
                }
                Ok(Segment::Date(fmt.to_string()))
            }
            _ => Err(AppError::validation(format!(
                "Unknown variable '${{{var}}}' in output pattern '{raw}'"
            ))),
        },
    }
}

/// Split `report.2024.csv` into (`report.2024`, `csv`). Leading-dot names
/// have no extension.
fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => (&file_name[..idx], &file_name[idx + 1..]),
        _ => (file_name, ""),
    }
}
