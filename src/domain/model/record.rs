use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

/// 貸出状態。`borrower` の有無で決まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Borrowed,
}

/// 評価の集計結果。評価が一件もなければ `NoRatings`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingSummary {
    NoRatings,
    Average { mean: f64, count: usize },
}

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// 蔵書レコード。Catalogが所有し、Catalogを通じて操作する。
///
/// フィールド順はそのままJSONファイルのキー順になる。
/// 旧形式のファイルには `ratings` と `borrower` が無いため default で補う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    title: String,
    author: String,
    isbn: String,
    borrowed: Option<String>,
    returned: Option<String>,
    #[serde(default, deserialize_with = "deserialize_ratings")]
    ratings: Vec<u8>,
    #[serde(default)]
    borrower: Option<String>,
}

impl Record {
    pub(crate) fn new(
        title: String,
        author: String,
        isbn: String,
        borrowed: Option<String>,
    ) -> Self {
        Self {
            title,
            author,
            isbn,
            borrowed,
            returned: None,
            ratings: Vec::new(),
            borrower: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn isbn(&self) -> &str {
        &self.isbn
    }

    pub fn borrowed(&self) -> Option<&str> {
        self.borrowed.as_deref()
    }

    pub fn returned(&self) -> Option<&str> {
        self.returned.as_deref()
    }

    pub fn borrower(&self) -> Option<&str> {
        self.borrower.as_deref()
    }

    pub fn ratings(&self) -> &[u8] {
        &self.ratings
    }

    pub fn availability(&self) -> Availability {
        match self.borrower {
            Some(_) => Availability::Borrowed,
            None => Availability::Available,
        }
    }

    pub fn rating_summary(&self) -> RatingSummary {
        if self.ratings.is_empty() {
            return RatingSummary::NoRatings;
        }
        let total: u32 = self.ratings.iter().map(|&r| u32::from(r)).sum();
        let count = self.ratings.len();
        RatingSummary::Average {
            mean: f64::from(total) / count as f64,
            count,
        }
    }

    /// `needle` は小文字化済みであること。
    pub(crate) fn matches(&self, needle: &str) -> bool {
        [&self.title, &self.author, &self.isbn]
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
    }

    // --- 内部操作（Catalog経由でのみ呼ばれる） ---

    pub(crate) fn push_rating(&mut self, rating: u8) {
        self.ratings.push(rating);
    }

    pub(crate) fn lend_to(&mut self, borrower: String, marker: String) {
        self.borrower = Some(borrower);
        self.borrowed = Some(marker);
    }

    pub(crate) fn take_back(&mut self) {
        self.borrower = None;
        self.borrowed = None;
    }
}

/// 評価は 1..=5 のみ。範囲外はファイル全体の読み込みエラーにする。
fn deserialize_ratings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let raw = Vec::<i64>::deserialize(deserializer)?;
    raw.into_iter()
        .map(|r| {
            u8::try_from(r)
                .ok()
                .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
                .ok_or_else(|| de::Error::invalid_value(Unexpected::Signed(r), &"a rating from 1 to 5"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dune() -> Record {
        Record::new(
            "Dune".into(),
            "Frank Herbert".into(),
            "9780441013593".into(),
            None,
        )
    }

    #[test]
    fn new_record_is_available_and_unrated() {
        let r = dune();
        assert_eq!(r.availability(), Availability::Available);
        assert_eq!(r.rating_summary(), RatingSummary::NoRatings);
        assert!(r.returned().is_none());
    }

    #[test]
    fn summary_is_arithmetic_mean() {
        let mut r = dune();
        r.push_rating(4);
        r.push_rating(5);
        assert_eq!(
            r.rating_summary(),
            RatingSummary::Average {
                mean: 4.5,
                count: 2
            }
        );
    }

    #[test]
    fn legacy_json_without_ratings_or_borrower() {
        let json = r#"{
            "title": "Dune",
            "author": "Frank Herbert",
            "isbn": "9780441013593",
            "borrowed": "2024-01-02",
            "returned": null
        }"#;
        let r: Record = serde_json::from_str(json).unwrap();
        assert!(r.ratings().is_empty());
        assert!(r.borrower().is_none());
        assert_eq!(r.borrowed(), Some("2024-01-02"));
        // borrowerが無いので貸出中とはみなさない
        assert_eq!(r.availability(), Availability::Available);
    }

    #[test]
    fn out_of_range_ratings_are_rejected_on_load() {
        let with = |ratings: &str| {
            format!(
                r#"{{"title": "Dune", "author": "Frank Herbert", "isbn": "1",
                    "borrowed": null, "returned": null, "ratings": {ratings}}}"#
            )
        };

        for bad in ["[9, 0]", "[0]", "[6]", "[-1]", "[300]"] {
            let err = serde_json::from_str::<Record>(&with(bad)).unwrap_err();
            assert!(
                err.to_string().contains("a rating from 1 to 5"),
                "{bad}: {err}"
            );
        }

        let ok: Record = serde_json::from_str(&with("[1, 5]")).unwrap();
        assert_eq!(ok.ratings(), &[1, 5]);
    }

    #[test]
    fn matches_is_per_field() {
        let r = dune();
        assert!(r.matches("dune"));
        assert!(r.matches("herbert"));
        assert!(r.matches("0441"));
        // フィールドを跨いだ連結には一致しない
        assert!(!r.matches("dunefrank"));
    }
}
