use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;

use crate::domain::model::catalog::Catalog;
use crate::domain::repository::CatalogRepository;

/// 既定のデータファイル名
pub const DEFAULT_DATA_FILE: &str = "library_data.json";

const INDENT: &[u8] = b"    ";

#[derive(Debug, thiserror::Error)]
pub enum JsonStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{} is not a valid library file: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON encode error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// JSONファイルによるCatalogRepository実装。
/// 1 Catalog = 1 JSONファイル。
#[derive(Debug, Clone)]
pub struct JsonCatalogRepository {
    path: PathBuf,
}

/// データファイル横の `.lock` に対するアドバイザリロック。drop で解放される。
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

impl JsonCatalogRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    /// 排他ロック。load → 変更 → save の間保持する。
    /// ロックファイルと親ディレクトリは必要なら作る。
    pub fn lock_exclusive(&self) -> Result<StoreLock, JsonStoreError> {
        let lock_path = self.lock_path();
        let to_lock_error = |source| JsonStoreError::Lock {
            path: lock_path.clone(),
            source,
        };
        ensure_parent(&lock_path).map_err(to_lock_error)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(to_lock_error)?;
        file.lock_exclusive().map_err(to_lock_error)?;
        tracing::debug!(path = %lock_path.display(), "exclusive store lock acquired");
        Ok(StoreLock { file })
    }

    /// 共有ロック。読み取りのみのコマンド用で、ディスクには何も作らない。
    ///
    /// ロックファイルが無い（まだ誰も書き込んでいない）か開く権限が無い場合は
    /// ロック無しで `None` を返す。
    pub fn lock_shared(&self) -> Result<Option<StoreLock>, JsonStoreError> {
        let lock_path = self.lock_path();
        let file = match File::open(&lock_path) {
            Ok(file) => file,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
                ) =>
            {
                tracing::debug!(path = %lock_path.display(), error = %e, "reading without store lock");
                return Ok(None);
            }
            Err(source) => {
                return Err(JsonStoreError::Lock {
                    path: lock_path,
                    source,
                })
            }
        };
        if let Err(source) = file.lock_shared() {
            return Err(JsonStoreError::Lock {
                path: lock_path,
                source,
            });
        }
        tracing::debug!(path = %lock_path.display(), "shared store lock acquired");
        Ok(Some(StoreLock { file }))
    }
}

impl CatalogRepository for JsonCatalogRepository {
    type Error = JsonStoreError;

    fn load(&self) -> Result<Catalog, Self::Error> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no data file yet, starting empty");
                return Ok(Catalog::new());
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map_err(|source| JsonStoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// 一時ファイルに書いてからrenameで置き換える。
    /// 途中で落ちても元のファイルは壊れない。
    fn save(&self, catalog: &Catalog) -> Result<(), Self::Error> {
        ensure_parent(&self.path)?;

        let mut content = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut content, formatter);
        catalog
            .serialize(&mut ser)
            .map_err(JsonStoreError::Serialize)?;
        content.push(b'\n');

        let tmp = sibling(&self.path, &format!(".{}.tmp", uuid::Uuid::new_v4()));
        if let Err(e) = write_synced(&tmp, &content).and_then(|()| fs::rename(&tmp, &self.path)) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn write_synced(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content)?;
    file.sync_all()
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// `path` の末尾に `suffix` を足した同じディレクトリ内のパス
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
