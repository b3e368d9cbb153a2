//! Extension → parser dispatch and the per-format text extractors.
//!
//! Every parser returns the file as an ordered list of [`TextUnit`]s (pages,
//! rows, sheets, or a single unit for flat formats). Selecting which units end
//! up in the `DocumentRecord` is the ingestor's job.

use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Closed set of parsers, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Csv,
    Text,
    /// `.docx`, and `.doc` on a best-effort basis.
    Word,
    /// Fallback for formats that are loadable without a dedicated parser.
    Generic(GenericFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenericFormat {
    /// `.xlsx` workbooks, one unit per worksheet.
    Spreadsheet,
    /// Markdown and HTML, read as text with tags stripped.
    Markup,
}

/// One extracted piece of a file, with an optional lineage label such as
/// `("page", "0")`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextUnit {
    pub text: String,
    pub label: Option<(&'static str, String)>,
}

impl TextUnit {
    fn whole(text: String) -> Self {
        Self { text, label: None }
    }

    fn labeled(text: String, key: &'static str, value: impl ToString) -> Self {
        Self { text, label: Some((key, value.to_string())) }
    }
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let kind = match extension.as_str() {
            "pdf" => Self::Pdf,
            "csv" => Self::Csv,
            "txt" => Self::Text,
            "doc" | "docx" => Self::Word,
            "xlsx" => Self::Generic(GenericFormat::Spreadsheet),
            "md" | "markdown" | "html" | "htm" => Self::Generic(GenericFormat::Markup),
            _ => return Err(Error::UnsupportedFormat { path: path.to_path_buf(), extension }),
        };
        Ok(kind)
    }

    pub fn extract_units(self, path: &Path) -> Result<Vec<TextUnit>> {
        let bytes = std::fs::read(path).map_err(|e| Error::parse_failure(path, e))?;
        match self {
            Self::Pdf => pdf_units(path, &bytes),
            Self::Csv => csv_units(path, &bytes),
            Self::Text => Ok(vec![TextUnit::whole(decode_text(&bytes))]),
            Self::Word => word_units(path, &bytes),
            Self::Generic(GenericFormat::Spreadsheet) => xlsx_units(path, &bytes),
            Self::Generic(GenericFormat::Markup) => {
                let text = decode_text(&bytes);
                let is_html = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"));
                let text = if is_html { html_to_text(&text) } else { text };
                Ok(vec![TextUnit::whole(text)])
            }
        }
    }
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn pdf_units(path: &Path, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    // pdf-extract panics on some malformed inputs.
    let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
        .map_err(|_| Error::parse_failure(path, "pdf parser panicked"))?
        .map_err(|e| Error::parse_failure(path, e))?;
    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| TextUnit::labeled(text, "page", page))
        .collect())
}

/// Each row becomes `header: value` lines, one line per column.
fn csv_units(path: &Path, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);
    let headers = reader.headers().map_err(|e| Error::parse_failure(path, e))?.clone();
    let mut units = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::parse_failure(path, e))?;
        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h.trim(), v.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        units.push(TextUnit::labeled(text, "row", row));
    }
    Ok(units)
}

fn word_units(path: &Path, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    if bytes.starts_with(b"PK") {
        let xml = read_zip_entry(path, bytes, "word/document.xml")?;
        return Ok(vec![TextUnit::whole(docx_xml_to_text(&xml))]);
    }
    // Legacy binary .doc: keep runs of printable text.
    let text = printable_runs(bytes, 8);
    if text.trim().is_empty() {
        return Err(Error::parse_failure(path, "no readable text in legacy word document"));
    }
    Ok(vec![TextUnit::whole(text)])
}

fn xlsx_units(path: &Path, bytes: &[u8]) -> Result<Vec<TextUnit>> {
    let mut archive = open_zip(path, bytes)?;
    let shared = match archive.by_name("xl/sharedStrings.xml") {
        Ok(mut entry) => {
            let mut xml = String::new();
            entry.read_to_string(&mut xml).map_err(|e| Error::parse_failure(path, e))?;
            shared_strings(&xml)
        }
        Err(_) => Vec::new(),
    };

    let mut sheets: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let n = name.strip_prefix("xl/worksheets/sheet")?.strip_suffix(".xml")?;
            Some((n.parse().ok()?, name.to_string()))
        })
        .collect();
    sheets.sort();

    let mut units = Vec::new();
    for (number, name) in sheets {
        let mut xml = String::new();
        archive
            .by_name(&name)
            .map_err(|e| Error::parse_failure(path, e))?
            .read_to_string(&mut xml)
            .map_err(|e| Error::parse_failure(path, e))?;
        units.push(TextUnit::labeled(sheet_to_text(&xml, &shared), "sheet", number));
    }
    Ok(units)
}

fn open_zip<'a>(path: &Path, bytes: &'a [u8]) -> Result<zip::ZipArchive<Cursor<&'a [u8]>>> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::parse_failure(path, e))
}

fn read_zip_entry(path: &Path, bytes: &[u8], name: &str) -> Result<String> {
    let mut archive = open_zip(path, bytes)?;
    let mut entry = archive.by_name(name).map_err(|e| Error::parse_failure(path, e))?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).map_err(|e| Error::parse_failure(path, e))?;
    Ok(xml)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static regex is valid"))
}

fn strip_tags(xml: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    regex(&TAG, r"<[^>]*>").replace_all(xml, "").into_owned()
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

pub(crate) fn docx_xml_to_text(xml: &str) -> String {
    let with_breaks = xml
        .replace("</w:p>", "\n")
        .replace("<w:tab/>", "\t")
        .replace("<w:br/>", "\n");
    let text = decode_entities(&strip_tags(&with_breaks));
    text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n").trim().to_string()
}

fn shared_strings(xml: &str) -> Vec<String> {
    static SI: OnceLock<Regex> = OnceLock::new();
    regex(&SI, r"(?s)<si>(.*?)</si>")
        .captures_iter(xml)
        .map(|c| decode_entities(&strip_tags(&c[1])))
        .collect()
}

pub(crate) fn sheet_to_text(xml: &str, shared: &[String]) -> String {
    static ROW: OnceLock<Regex> = OnceLock::new();
    static CELL: OnceLock<Regex> = OnceLock::new();
    static CELL_TYPE: OnceLock<Regex> = OnceLock::new();
    static VALUE: OnceLock<Regex> = OnceLock::new();
    let row_re = regex(&ROW, r"(?s)<row\b[^>]*>(.*?)</row>");
    let cell_re = regex(&CELL, r"(?s)<c\b([^>]*?)(?:/>|>(.*?)</c>)");
    let type_re = regex(&CELL_TYPE, r#"\bt="([^"]+)""#);
    let value_re = regex(&VALUE, r"(?s)<v>(.*?)</v>");

    let mut lines = Vec::new();
    for row in row_re.captures_iter(xml) {
        let mut cells = Vec::new();
        for cell in cell_re.captures_iter(&row[1]) {
            let body = cell.get(2).map_or("", |m| m.as_str());
            let cell_type = type_re.captures(&cell[1]).map(|t| t[1].to_string());
            let raw = value_re.captures(body).map(|v| v[1].to_string());
            let value = match (cell_type.as_deref(), raw) {
                (Some("s"), Some(idx)) => idx.trim().parse::<usize>().ok().and_then(|i| shared.get(i).cloned()),
                (Some("inlineStr"), _) => Some(decode_entities(&strip_tags(body))),
                (_, Some(v)) => Some(decode_entities(&v)),
                (_, None) => None,
            };
            if let Some(v) = value.filter(|v| !v.is_empty()) {
                cells.push(v);
            }
        }
        if !cells.is_empty() {
            lines.push(cells.join("\t"));
        }
    }
    lines.join("\n")
}

fn html_to_text(html: &str) -> String {
    static BLOCKS: OnceLock<Regex> = OnceLock::new();
    static BREAKS: OnceLock<Regex> = OnceLock::new();
    let without_blocks = regex(&BLOCKS, r"(?is)<(script|style)\b.*?</(script|style)>").replace_all(html, "");
    let with_breaks = regex(&BREAKS, r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|tr)>").replace_all(&without_blocks, "\n");
    let text = decode_entities(&strip_tags(&with_breaks));
    text.lines().map(str::trim).filter(|l| !l.is_empty()).collect::<Vec<_>>().join("\n")
}

fn printable_runs(bytes: &[u8], min_len: usize) -> String {
    let mut runs = Vec::new();
    let mut current = String::new();
    for &b in bytes {
        if b == b'\t' || (0x20..0x7f).contains(&b) {
            current.push(char::from(b));
        } else {
            if current.trim().len() >= min_len {
                runs.push(current.trim().to_string());
            }
            current.clear();
        }
    }
    if current.trim().len() >= min_len {
        runs.push(current.trim().to_string());
    }
    runs.join("\n")
}
