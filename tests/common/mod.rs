//! Shared test harness for integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};

use library_cli::application::store::RecordStore;
use library_cli::domain::model::catalog::{AddRecordRequest, Catalog};
use library_cli::domain::repository::CatalogRepository;

// =============================================================================
// InMemoryRepo — テスト用リポジトリ
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    #[error("in-memory store rejected the write")]
    Rejected,
    #[error("in-memory store holds invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// ファイルI/O不要のインメモリリポジトリ。保存内容はJSON文字列のまま保持する。
pub struct InMemoryRepo {
    stored: RefCell<Option<String>>,
    fail_saves: Cell<bool>,
    saves: Cell<usize>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            stored: RefCell::new(None),
            fail_saves: Cell::new(false),
            saves: Cell::new(0),
        }
    }

    pub fn with_raw(json: &str) -> Self {
        let repo = Self::new();
        *repo.stored.borrow_mut() = Some(json.to_string());
        repo
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.set(fail);
    }

    /// 成功したsaveの回数
    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    /// 最後に保存された内容を読み直したもの
    pub fn persisted(&self) -> Catalog {
        self.load().unwrap()
    }
}

impl CatalogRepository for InMemoryRepo {
    type Error = InMemoryError;

    fn load(&self) -> Result<Catalog, Self::Error> {
        match self.stored.borrow().as_deref() {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(Catalog::new()),
        }
    }

    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error> {
        if self.fail_saves.get() {
            return Err(InMemoryError::Rejected);
        }
        let json = serde_json::to_string(catalog)?;
        *self.stored.borrow_mut() = Some(json);
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn request(id: &str, title: &str, author: &str, isbn: &str) -> AddRecordRequest {
    AddRecordRequest {
        id: id.into(),
        title: title.into(),
        author: author.into(),
        isbn: isbn.into(),
        borrowed: None,
    }
}

/// 標準的なテスト用Catalog:
/// ```text
/// B1  Dune          Frank Herbert    9780441013593
/// B2  Neuromancer   William Gibson   9780441569595
/// B3  Hyperion      Dan Simmons      9780553283686
/// ```
pub fn standard_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.add(request("B1", "Dune", "Frank Herbert", "9780441013593"));
    catalog.add(request("B2", "Neuromancer", "William Gibson", "9780441569595"));
    catalog.add(request("B3", "Hyperion", "Dan Simmons", "9780553283686"));
    catalog
}

/// InMemoryRepoに標準Catalogを保存してRecordStoreを返す。
pub fn standard_store() -> RecordStore<InMemoryRepo> {
    let repo = InMemoryRepo::new();
    repo.save(&standard_catalog()).unwrap();
    RecordStore::load(repo).unwrap()
}

// =============================================================================
// Assertion helpers
// =============================================================================

/// 結果がErrで、メッセージに指定文字列を含むことをassert。
pub fn assert_error_contains<T: std::fmt::Debug>(
    result: Result<T, impl std::fmt::Display>,
    expected: &str,
) {
    match result {
        Err(e) => {
            let msg = e.to_string();
            assert!(
                msg.contains(expected),
                "Expected error containing '{expected}', got: '{msg}'"
            );
        }
        Ok(v) => panic!("Expected error containing '{expected}', got Ok({v:?})"),
    }
}
