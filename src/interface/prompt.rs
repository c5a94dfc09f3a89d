//! Interactive field entry for `add` when the record fields are not given on
//! the command line. Works over any reader/writer pair so it stays testable.

use std::io::{self, BufRead, Write};

use crate::domain::model::catalog::AddRecordRequest;

/// 標準入出力から新規レコードの各フィールドを問い合わせる。
pub fn prompt_for_new_record_fields<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> io::Result<AddRecordRequest> {
    let id = ask_required(input, output, "Book ID")?;
    let title = ask_required(input, output, "Title")?;
    let author = ask_required(input, output, "Author")?;
    let isbn = ask_required(input, output, "ISBN")?;
    let borrowed = ask(input, output, "Borrowed (leave empty if not borrowed)")?;

    Ok(AddRecordRequest {
        id: id.into(),
        title,
        author,
        isbn,
        borrowed,
    })
}

/// 空でない回答が得られるまで繰り返す。入力が尽きたらエラー。
fn ask_required<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> io::Result<String> {
    loop {
        if let Some(answer) = ask(input, output, label)? {
            return Ok(answer);
        }
        writeln!(output, "{label} cannot be empty.")?;
    }
}

/// 1行読む。空行は None。EOF は UnexpectedEof。
fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> io::Result<Option<String>> {
    write!(output, "{label}: ")?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("input ended while asking for {label}"),
        ));
    }
    let answer = line.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}
