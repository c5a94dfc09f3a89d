use super::model::catalog::Catalog;

/// 永続化の抽象。Infra層が実装する。
///
/// `load` は保存先が存在しなければ空のCatalogを返す。
pub trait CatalogRepository {
    type Error: std::error::Error + Send + Sync + 'static;

    fn load(&self) -> Result<Catalog, Self::Error>;
    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error>;
}
