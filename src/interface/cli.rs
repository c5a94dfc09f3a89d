//! Command-line surface for the library catalog.
//!
//! Every command is one load → (mutate → save) cycle against the data file,
//! performed while holding the store lock.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use crate::application::store::RecordStore;
use crate::domain::model::catalog::AddRecordRequest;
use crate::domain::model::id::BookId;
use crate::infra::json_store::{JsonCatalogRepository, StoreLock, DEFAULT_DATA_FILE};

use super::output::{Output, OutputFormat};
use super::prompt::prompt_for_new_record_fields;

/// library - manage a small book catalog stored in a JSON file
#[derive(Parser, Debug)]
#[command(name = "library")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Path to the library data file
    #[arg(long, global = true, env = "LIBRARY_DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List all records
    List,

    /// Add a record (prompts for the fields when they are omitted)
    Add {
        /// Book ID
        id: Option<String>,
        /// Title
        title: Option<String>,
        /// Author
        author: Option<String>,
        /// ISBN
        isbn: Option<String>,
        /// Borrow marker to store with the record
        #[arg(short, long)]
        borrowed: Option<String>,
    },

    /// Delete a record
    Delete {
        /// Book ID
        id: String,
    },

    /// Show a record
    Show {
        /// Book ID
        id: String,
    },

    /// Search title, author and ISBN (case-insensitive)
    Search {
        /// Keyword to look for
        keyword: String,
    },

    /// Rate a book from 1 to 5
    Rate {
        /// Book ID
        id: String,
        /// Rating (1-5)
        #[arg(allow_negative_numbers = true)]
        rating: i64,
    },

    /// Show the average rating of a book
    Rating {
        /// Book ID
        id: String,
    },

    /// Borrow a book
    Borrow {
        /// Book ID
        id: String,
        /// Name of the borrower
        name: String,
    },

    /// Return a borrowed book
    Return {
        /// Book ID
        id: String,
    },
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let mut out = Output::new(OutputFormat::from_flag(self.json));
        let path = self.data_file.as_path();

        match self.command {
            Commands::List => {
                let (store, _lock) = open_store(path, false)?;
                out.print_records("All Book Records", store.list(), "No records in the library.")?;
            }
            Commands::Add {
                id,
                title,
                author,
                isbn,
                borrowed,
            } => {
                // 対話入力はロックを取る前に済ませる
                let req = add_request(id, title, author, isbn, borrowed)?;
                let id = req.id.clone();
                let (mut store, _lock) = open_store(path, true)?;
                store.add(req)?;
                out.print_message(&format!("Record for Book ID {id} has been added."))?;
            }
            Commands::Delete { id } => {
                let id = BookId::from(id);
                let (mut store, _lock) = open_store(path, true)?;
                store.delete(&id)?;
                out.print_message(&format!("Record for Book ID {id} has been deleted."))?;
            }
            Commands::Show { id } => {
                let id = BookId::from(id);
                let (store, _lock) = open_store(path, false)?;
                out.print_record(&id, store.get(&id)?)?;
            }
            Commands::Search { keyword } => {
                let (store, _lock) = open_store(path, false)?;
                out.print_records(
                    &format!("Search Results for \"{keyword}\""),
                    store.search(&keyword),
                    "No matching records.",
                )?;
            }
            Commands::Rate { id, rating } => {
                let id = BookId::from(id);
                let (mut store, _lock) = open_store(path, true)?;
                store.rate(&id, rating)?;
                out.print_message(&format!("Rated book {id}: {rating}"))?;
            }
            Commands::Rating { id } => {
                let id = BookId::from(id);
                let (store, _lock) = open_store(path, false)?;
                out.print_rating(&id, store.average_rating(&id)?)?;
            }
            Commands::Borrow { id, name } => {
                let id = BookId::from(id);
                let (mut store, _lock) = open_store(path, true)?;
                store.borrow(&id, &name)?;
                out.print_message(&format!("Book {id} has been borrowed by {name}."))?;
            }
            Commands::Return { id } => {
                let id = BookId::from(id);
                let (mut store, _lock) = open_store(path, true)?;
                store.return_book(&id)?;
                out.print_message(&format!("Book {id} has been returned."))?;
            }
        }

        Ok(())
    }
}

/// ロックを取ってからストアを読み込む。ロックはコマンド終了まで保持する。
fn open_store(
    path: &Path,
    exclusive: bool,
) -> Result<(RecordStore<JsonCatalogRepository>, Option<StoreLock>)> {
    let repo = JsonCatalogRepository::new(path);
    // 読み取り系はディスクに何も作らない。ロックファイルが無ければロック無しで読む
    let lock = if exclusive {
        Some(repo.lock_exclusive()?)
    } else {
        repo.lock_shared()?
    };
    let store = RecordStore::load(repo)?;
    Ok((store, lock))
}

/// 引数が全て揃っていればそのまま、全て無ければ対話入力で AddRecordRequest を作る。
/// 問い合わせは stderr に出し、stdout はコマンド出力専用に保つ。
pub fn add_request(
    id: Option<String>,
    title: Option<String>,
    author: Option<String>,
    isbn: Option<String>,
    borrowed: Option<String>,
) -> Result<AddRecordRequest> {
    let stdin = io::stdin();
    add_request_with(
        (id, title, author, isbn),
        borrowed,
        &mut stdin.lock(),
        &mut io::stderr(),
    )
}

fn add_request_with<R: BufRead, W: Write>(
    fields: (Option<String>, Option<String>, Option<String>, Option<String>),
    borrowed: Option<String>,
    input: &mut R,
    prompts: &mut W,
) -> Result<AddRecordRequest> {
    match fields {
        (Some(id), Some(title), Some(author), Some(isbn)) => Ok(AddRecordRequest {
            id: id.into(),
            title,
            author,
            isbn,
            borrowed,
        }),
        (None, None, None, None) => {
            let mut req = prompt_for_new_record_fields(input, prompts)?;
            if borrowed.is_some() {
                req.borrowed = borrowed;
            }
            Ok(req)
        }
        _ => bail!("add needs all of ID, TITLE, AUTHOR and ISBN, or none of them to be prompted"),
    }
}
