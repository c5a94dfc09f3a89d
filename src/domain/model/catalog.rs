use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::id::BookId;
use super::record::{RatingSummary, Record, MAX_RATING, MIN_RATING};
use crate::domain::error::DomainError;

/// レコード追加リクエスト
#[derive(Debug, Clone)]
pub struct AddRecordRequest {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    /// 貸出マーカー（Noneなら未貸出）
    pub borrowed: Option<String>,
}

/// 蔵書カタログ — 集約ルート。全レコード操作はここを経由する。
///
/// JSON上は `{ "<book id>": { ...record } }` のフラットなオブジェクト。
/// キー順は挿入順として保持される。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    records: HashMap<BookId, Record>,
    order: Vec<BookId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &BookId) -> bool {
        self.records.contains_key(id)
    }

    pub fn get(&self, id: &BookId) -> Result<&Record, DomainError> {
        self.records
            .get(id)
            .ok_or_else(|| DomainError::NotFound(id.clone()))
    }

    /// レコード追加。同じIDが既にあれば上書きし、置き換えた旧レコードを返す。
    /// 上書き時も一覧上の位置は変わらない。
    pub fn add(&mut self, req: AddRecordRequest) -> Option<Record> {
        let record = Record::new(req.title, req.author, req.isbn, req.borrowed);
        self.insert(req.id, record)
    }

    /// レコード削除。貸出中かどうかに関わらず削除できる。
    pub fn remove(&mut self, id: &BookId) -> Result<Record, DomainError> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| DomainError::NotFound(id.clone()))?;
        self.order.retain(|existing| existing != id);
        Ok(record)
    }

    /// 挿入順で (ID, レコード) を返す。呼ぶたびに先頭からやり直せる。
    pub fn iter(&self) -> impl Iterator<Item = (&BookId, &Record)> + '_ {
        self.order
            .iter()
            .filter_map(|id| self.records.get_key_value(id))
    }

    /// title / author / isbn のいずれかに大文字小文字を区別せず部分一致するレコード。
    /// 空文字列は全件に一致する。
    pub fn search(&self, keyword: &str) -> impl Iterator<Item = (&BookId, &Record)> + '_ {
        let needle = keyword.to_lowercase();
        self.iter().filter(move |(_, record)| record.matches(&needle))
    }

    /// 評価を追加する。範囲外の値は何も変更せずに弾く。
    pub fn rate(&mut self, id: &BookId, rating: i64) -> Result<(), DomainError> {
        let rating = validate_rating(rating)?;
        let record = self.get_mut(id)?;
        record.push_rating(rating);
        Ok(())
    }

    pub fn average_rating(&self, id: &BookId) -> Result<RatingSummary, DomainError> {
        Ok(self.get(id)?.rating_summary())
    }

    /// 貸出。Available → Borrowed。既に貸出中ならConflict。
    pub fn borrow(
        &mut self,
        id: &BookId,
        borrower: impl Into<String>,
        marker: impl Into<String>,
    ) -> Result<(), DomainError> {
        let record = self.get_mut(id)?;
        if let Some(current) = record.borrower() {
            return Err(DomainError::AlreadyBorrowed {
                id: id.clone(),
                borrower: current.to_string(),
            });
        }
        record.lend_to(borrower.into(), marker.into());
        Ok(())
    }

    /// 返却。Borrowed → Available。貸出中でなければConflict。
    pub fn return_book(&mut self, id: &BookId) -> Result<(), DomainError> {
        let record = self.get_mut(id)?;
        if record.borrower().is_none() {
            return Err(DomainError::NotBorrowed(id.clone()));
        }
        record.take_back();
        Ok(())
    }

    // --- Private helpers ---

    fn get_mut(&mut self, id: &BookId) -> Result<&mut Record, DomainError> {
        self.records
            .get_mut(id)
            .ok_or_else(|| DomainError::NotFound(id.clone()))
    }

    fn insert(&mut self, id: BookId, record: Record) -> Option<Record> {
        let previous = self.records.insert(id.clone(), record);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }
}

fn validate_rating(rating: i64) -> Result<u8, DomainError> {
    u8::try_from(rating)
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
        .ok_or(DomainError::InvalidRating(rating))
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, record) in self.iter() {
            map.serialize_entry(id, record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Catalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CatalogVisitor)
    }
}

struct CatalogVisitor;

impl<'de> Visitor<'de> for CatalogVisitor {
    type Value = Catalog;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object mapping book ids to records")
    }

    // ファイル上のキー順をそのまま挿入順とする
    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Catalog, A::Error> {
        let mut catalog = Catalog::new();
        while let Some((id, record)) = access.next_entry::<BookId, Record>()? {
            catalog.insert(id, record);
        }
        Ok(catalog)
    }
}
