use crate::domain::error::DomainError;
use crate::domain::model::catalog::{AddRecordRequest, Catalog};
use crate::domain::model::id::BookId;
use crate::domain::model::record::{RatingSummary, Record};
use crate::domain::repository::CatalogRepository;

use super::error::AppError;

/// 貸出マーカーの日付書式
const BORROW_MARKER_FORMAT: &str = "%Y-%m-%d";

/// メモリ上のCatalogと保存先の同期を担うストア。
///
/// 起動時に一度 load し、変更系の操作は必ず save が成功してから反映される。
/// save に失敗した場合、メモリ上の状態は操作前のまま残る。
pub struct RecordStore<R: CatalogRepository> {
    repo: R,
    catalog: Catalog,
}

impl<R: CatalogRepository> RecordStore<R> {
    /// 保存先からCatalogを読み込む。保存先が無ければ空のストアになる。
    pub fn load(repo: R) -> Result<Self, AppError> {
        let catalog = repo.load().map_err(AppError::storage)?;
        tracing::debug!(records = catalog.len(), "catalog loaded");
        Ok(Self { repo, catalog })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// レコードを追加する。既存IDは警告のうえ上書き。
    pub fn add(&mut self, req: AddRecordRequest) -> Result<(), AppError> {
        let id = req.id.clone();
        let previous = self.commit(|catalog| Ok(catalog.add(req)))?;
        if previous.is_some() {
            tracing::warn!(book_id = %id, "existing record overwritten");
        }
        tracing::info!(book_id = %id, "record added");
        Ok(())
    }

    pub fn get(&self, id: &BookId) -> Result<&Record, AppError> {
        Ok(self.catalog.get(id)?)
    }

    pub fn delete(&mut self, id: &BookId) -> Result<Record, AppError> {
        let removed = self.commit(|catalog| catalog.remove(id))?;
        tracing::info!(book_id = %id, "record deleted");
        Ok(removed)
    }

    pub fn list(&self) -> impl Iterator<Item = (&BookId, &Record)> + '_ {
        self.catalog.iter()
    }

    pub fn search(&self, keyword: &str) -> impl Iterator<Item = (&BookId, &Record)> + '_ {
        self.catalog.search(keyword)
    }

    pub fn rate(&mut self, id: &BookId, rating: i64) -> Result<(), AppError> {
        self.commit(|catalog| catalog.rate(id, rating))?;
        tracing::info!(book_id = %id, rating, "rating recorded");
        Ok(())
    }

    pub fn average_rating(&self, id: &BookId) -> Result<RatingSummary, AppError> {
        Ok(self.catalog.average_rating(id)?)
    }

    /// 貸出。マーカーには当日の日付を記録する。
    pub fn borrow(&mut self, id: &BookId, borrower: &str) -> Result<(), AppError> {
        let marker = chrono::Local::now()
            .format(BORROW_MARKER_FORMAT)
            .to_string();
        self.commit(|catalog| catalog.borrow(id, borrower, marker))?;
        tracing::info!(book_id = %id, borrower, "record borrowed");
        Ok(())
    }

    pub fn return_book(&mut self, id: &BookId) -> Result<(), AppError> {
        self.commit(|catalog| catalog.return_book(id))?;
        tracing::info!(book_id = %id, "record returned");
        Ok(())
    }

    /// 現在のCatalog全体を保存先へ書き出す。
    pub fn save(&self) -> Result<(), AppError> {
        self.persist(&self.catalog)
    }

    // --- private ---

    /// 複製に対して操作し、保存に成功したときだけ差し替える。
    fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut Catalog) -> Result<T, DomainError>,
    ) -> Result<T, AppError> {
        let mut next = self.catalog.clone();
        let out = op(&mut next)?;
        self.persist(&next)?;
        self.catalog = next;
        Ok(out)
    }

    fn persist(&self, catalog: &Catalog) -> Result<(), AppError> {
        self.repo.save(catalog).map_err(AppError::storage)?;
        tracing::debug!(records = catalog.len(), "catalog saved");
        Ok(())
    }
}
