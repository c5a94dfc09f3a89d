//! Output formatting for the CLI
//!
//! - Human-readable tables (default)
//! - JSON (`--json`)

use std::io::{self, Write};

use serde::Serialize;

use crate::domain::model::id::BookId;
use crate::domain::model::record::{RatingSummary, Record};

/// 出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Serialize)]
struct RecordView<'a> {
    id: &'a BookId,
    #[serde(flatten)]
    record: &'a Record,
}

#[derive(Serialize)]
struct RatingView<'a> {
    id: &'a BookId,
    average: Option<f64>,
    count: usize,
}

#[derive(Serialize)]
struct MessageView<'a> {
    message: &'a str,
}

/// 全コマンド共通の出力ヘルパー
///
/// 書き込み失敗（閉じたパイプなど）はパニックせずエラーとして返す。
pub struct Output<W: Write = io::Stdout> {
    pub format: OutputFormat,
    writer: W,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self::with_writer(format, io::stdout())
    }
}

impl<W: Write> Output<W> {
    pub fn with_writer(format: OutputFormat, writer: W) -> Self {
        Self { format, writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn print_record(&mut self, id: &BookId, record: &Record) -> anyhow::Result<()> {
        let text = match self.format {
            OutputFormat::Human => render_record(id, record),
            OutputFormat::Json => {
                format!("{}\n", serde_json::to_string_pretty(&RecordView { id, record })?)
            }
        };
        self.emit(&text)
    }

    /// 一覧表示。空なら `empty_message` を出す（JSONでは空配列）。
    pub fn print_records<'a>(
        &mut self,
        title: &str,
        records: impl Iterator<Item = (&'a BookId, &'a Record)>,
        empty_message: &str,
    ) -> anyhow::Result<()> {
        let records: Vec<_> = records.collect();
        let text = match self.format {
            OutputFormat::Human if records.is_empty() => format!("{empty_message}\n"),
            OutputFormat::Human => render_records(title, records),
            OutputFormat::Json => {
                let views: Vec<RecordView<'_>> = records
                    .into_iter()
                    .map(|(id, record)| RecordView { id, record })
                    .collect();
                format!("{}\n", serde_json::to_string_pretty(&views)?)
            }
        };
        self.emit(&text)
    }

    pub fn print_rating(&mut self, id: &BookId, summary: RatingSummary) -> anyhow::Result<()> {
        let text = match self.format {
            OutputFormat::Human => format!("{}\n", render_rating(id, summary)),
            OutputFormat::Json => {
                let (average, count) = match summary {
                    RatingSummary::NoRatings => (None, 0),
                    RatingSummary::Average { mean, count } => (Some(mean), count),
                };
                let view = RatingView { id, average, count };
                format!("{}\n", serde_json::to_string_pretty(&view)?)
            }
        };
        self.emit(&text)
    }

    pub fn print_message(&mut self, message: &str) -> anyhow::Result<()> {
        let text = match self.format {
            OutputFormat::Human => format!("{message}\n"),
            OutputFormat::Json => format!("{}\n", serde_json::to_string(&MessageView { message })?),
        };
        self.emit(&text)
    }

    fn emit(&mut self, text: &str) -> anyhow::Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// 1レコード分の Attribute / Value 表
pub fn render_record(id: &BookId, record: &Record) -> String {
    let rows = vec![
        vec!["Title".to_string(), record.title().to_string()],
        vec!["Author".to_string(), record.author().to_string()],
        vec!["ISBN".to_string(), record.isbn().to_string()],
        vec!["Borrowed".to_string(), borrowed_label(record)],
        vec!["Returned".to_string(), returned_label(record)],
        vec![
            "Borrower".to_string(),
            record.borrower().unwrap_or("-").to_string(),
        ],
        vec!["Rating".to_string(), rating_label(record.rating_summary())],
    ];
    render_table(
        &format!("Book Record for {id}"),
        &["Attribute", "Value"],
        &rows,
    )
}

/// 複数レコードの一覧表
pub fn render_records<'a>(
    title: &str,
    records: impl IntoIterator<Item = (&'a BookId, &'a Record)>,
) -> String {
    let rows: Vec<Vec<String>> = records
        .into_iter()
        .map(|(id, record)| {
            vec![
                id.to_string(),
                record.title().to_string(),
                record.author().to_string(),
                record.isbn().to_string(),
                borrowed_label(record),
                returned_label(record),
            ]
        })
        .collect();
    render_table(
        title,
        &["Book ID", "Title", "Author", "ISBN", "Borrowed", "Returned"],
        &rows,
    )
}

pub fn render_rating(id: &BookId, summary: RatingSummary) -> String {
    match summary {
        RatingSummary::NoRatings => format!("Book {id} has no ratings yet."),
        RatingSummary::Average { .. } => {
            format!("Average rating for book {id}: {}", rating_label(summary))
        }
    }
}

fn borrowed_label(record: &Record) -> String {
    record.borrowed().unwrap_or("Not Borrowed").to_string()
}

fn returned_label(record: &Record) -> String {
    record.returned().unwrap_or("Not Returned").to_string()
}

fn rating_label(summary: RatingSummary) -> String {
    match summary {
        RatingSummary::NoRatings => "No ratings yet".to_string(),
        RatingSummary::Average { mean, count } => {
            let noun = if count == 1 { "rating" } else { "ratings" };
            format!("{mean:.2} ({count} {noun})")
        }
    }
}

/// 罫線付きの表。列幅は文字数で揃える。
fn render_table(title: &str, headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = {
        let mut line = String::from("+");
        for width in &widths {
            line.push_str(&"-".repeat(width + 2));
            line.push('+');
        }
        line
    };
    let mut buf = String::new();
    buf.push_str(title);
    buf.push('\n');
    buf.push_str(&border);
    buf.push('\n');
    buf.push_str(&format_row(headers.iter().copied(), &widths));
    buf.push('\n');
    buf.push_str(&border);
    buf.push('\n');
    for row in rows {
        buf.push_str(&format_row(row.iter().map(String::as_str), &widths));
        buf.push('\n');
    }
    buf.push_str(&border);
    buf.push('\n');
    buf
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.zip(widths) {
        let pad = width - cell.chars().count();
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad + 1));
        line.push('|');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::catalog::{AddRecordRequest, Catalog};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add(AddRecordRequest {
            id: "B1".into(),
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            isbn: "9780441013593".into(),
            borrowed: None,
        });
        catalog
    }

    #[test]
    fn null_markers_render_as_labels() {
        let catalog = catalog();
        let id: BookId = "B1".into();
        let out = render_record(&id, catalog.get(&id).unwrap());
        assert!(out.starts_with("Book Record for B1\n"));
        assert!(out.contains("| Borrowed  | Not Borrowed "));
        assert!(out.contains("| Returned  | Not Returned "));
        assert!(out.contains("No ratings yet"));
    }

    #[test]
    fn table_columns_align() {
        let catalog = catalog();
        let out = render_records("All Book Records", catalog.iter());
        let lines: Vec<&str> = out.lines().skip(1).collect();
        let width = lines[0].chars().count();
        assert!(lines.iter().all(|l| l.chars().count() == width));
    }

    /// 常に BrokenPipe を返すライター（`| head -0` 相当）
    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn closed_output_is_an_error_not_a_panic() {
        let catalog = catalog();
        let mut out = Output::with_writer(OutputFormat::Human, ClosedPipe);
        let err = out
            .print_records("All Book Records", catalog.iter(), "empty")
            .unwrap_err();
        assert!(err.to_string().contains("closed"));
        assert!(out.print_message("done").is_err());
    }

    #[test]
    fn json_output_goes_to_writer() {
        let catalog = catalog();
        let mut out = Output::with_writer(OutputFormat::Json, Vec::new());
        out.print_records("ignored", catalog.iter(), "empty").unwrap();
        let written = String::from_utf8(out.into_inner()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed[0]["id"], "B1");
        assert_eq!(parsed[0]["title"], "Dune");
    }

    #[test]
    fn rating_text() {
        let id: BookId = "B1".into();
        assert_eq!(
            render_rating(&id, RatingSummary::NoRatings),
            "Book B1 has no ratings yet."
        );
        assert_eq!(
            render_rating(
                &id,
                RatingSummary::Average {
                    mean: 4.5,
                    count: 2
                }
            ),
            "Average rating for book B1: 4.50 (2 ratings)"
        );
    }
}
