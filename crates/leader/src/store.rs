//! 리스 저장소 — 메모리 구현과 공유 디렉토리 파일 구현
//!
//! 리스는 매 주기 읽은 뒤 조건부로 기록됩니다 (last-writer-wins + 만료).

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sbomer_core::config::LeaderConfig;

use crate::error::LeaderError;
use crate::lease::Lease;

/// 리스 저장소
pub trait LeaseStore: Send + Sync + 'static {
    /// 리스를 읽습니다. 없으면 `None`.
    fn read(&self, name: &str) -> impl Future<Output = Result<Option<Lease>, LeaderError>> + Send;

    /// 리스를 기록합니다.
    fn write(&self, lease: &Lease) -> impl Future<Output = Result<(), LeaderError>> + Send;

    /// 리스를 삭제합니다. 없으면 아무 일도 하지 않습니다.
    fn delete(&self, name: &str) -> impl Future<Output = Result<(), LeaderError>> + Send;
}

// ─── InMemoryLeaseStore ──────────────────────────────────────────────

/// 메모리 리스 저장소
///
/// 복제하면 같은 저장소를 공유하므로, 한 프로세스 안에서 여러 복제본을
/// 흉내낼 수 있습니다.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseStore {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> LeaderError {
    LeaderError::Store("lease map lock poisoned".to_owned())
}

impl LeaseStore for InMemoryLeaseStore {
    async fn read(&self, name: &str) -> Result<Option<Lease>, LeaderError> {
        let leases = self.leases.lock().map_err(|_| poisoned())?;
        Ok(leases.get(name).cloned())
    }

    async fn write(&self, lease: &Lease) -> Result<(), LeaderError> {
        let mut leases = self.leases.lock().map_err(|_| poisoned())?;
        leases.insert(lease.name.clone(), lease.clone());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), LeaderError> {
        let mut leases = self.leases.lock().map_err(|_| poisoned())?;
        leases.remove(name);
        Ok(())
    }
}

// ─── FileLeaseStore ──────────────────────────────────────────────────

/// 공유 디렉토리 리스 저장소
///
/// 리스마다 `<dir>/<name>.json` 파일 하나를 사용합니다. 기록은 임시 파일에
/// 쓴 뒤 rename하므로 읽는 쪽이 반쯤 쓰인 레코드를 보지 않습니다.
#[derive(Debug, Clone)]
pub struct FileLeaseStore {
    dir: PathBuf,
}

impl FileLeaseStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 리스 파일 경로
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> LeaderError {
    LeaderError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl LeaseStore for FileLeaseStore {
    async fn read(&self, name: &str) -> Result<Option<Lease>, LeaderError> {
        let path = self.path_for(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| LeaderError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&path, e)),
        }
    }

    async fn write(&self, lease: &Lease) -> Result<(), LeaderError> {
        let path = self.path_for(&lease.name);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", lease.name, uuid::Uuid::new_v4()));
        let bytes = serde_json::to_vec_pretty(lease)
            .map_err(|e| LeaderError::Serialization(e.to_string()))?;

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(&path, e));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), LeaderError> {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(&path, e)),
        }
    }
}

// ─── LeaseBackend ────────────────────────────────────────────────────

/// 설정으로 선택되는 리스 저장소
#[derive(Debug, Clone)]
pub enum LeaseBackend {
    Memory(InMemoryLeaseStore),
    File(FileLeaseStore),
}

impl LeaseBackend {
    /// `lease_dir`가 비어 있으면 메모리, 아니면 파일 저장소를 사용합니다.
    pub fn from_config(config: &LeaderConfig) -> Self {
        if config.lease_dir.trim().is_empty() {
            Self::Memory(InMemoryLeaseStore::new())
        } else {
            Self::File(FileLeaseStore::new(&config.lease_dir))
        }
    }

    /// 저장소 종류명
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }
}

impl LeaseStore for LeaseBackend {
    async fn read(&self, name: &str) -> Result<Option<Lease>, LeaderError> {
        match self {
            Self::Memory(store) => store.read(name).await,
            Self::File(store) => store.read(name).await,
        }
    }

    async fn write(&self, lease: &Lease) -> Result<(), LeaderError> {
        match self {
            Self::Memory(store) => store.write(lease).await,
            Self::File(store) => store.write(lease).await,
        }
    }

    async fn delete(&self, name: &str) -> Result<(), LeaderError> {
        match self {
            Self::Memory(store) => store.delete(name).await,
            Self::File(store) => store.delete(name).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    fn lease(holder: &str) -> Lease {
        Lease::acquire(
            "sbomer-leader",
            holder,
            15,
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
        )
    }

    #[tokio::test]
    async fn memory_store_round_trip_and_delete() {
        let store = InMemoryLeaseStore::new();
        assert!(store.read("sbomer-leader").await.unwrap().is_none());

        store.write(&lease("a")).await.unwrap();
        let shared = store.clone();
        assert_eq!(
            shared.read("sbomer-leader").await.unwrap(),
            Some(lease("a"))
        );

        store.delete("sbomer-leader").await.unwrap();
        assert!(shared.read("sbomer-leader").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_writes_atomically_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLeaseStore::new(dir.path());

        store.write(&lease("a")).await.unwrap();
        store.write(&lease("b")).await.unwrap();

        let read = store.read("sbomer-leader").await.unwrap().unwrap();
        assert_eq!(read.holder_identity, "b");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn file_store_missing_lease_is_none_and_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLeaseStore::new(dir.path());
        assert!(store.read("absent").await.unwrap().is_none());
        store.delete("absent").await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_lease_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileLeaseStore::new(dir.path());
        std::fs::write(store.path_for("sbomer-leader"), b"{not json").unwrap();
        let err = store.read("sbomer-leader").await.unwrap_err();
        assert!(matches!(err, LeaderError::Serialization(_)));
    }

    #[tokio::test]
    async fn missing_directory_is_an_io_error() {
        let store = FileLeaseStore::new("/nonexistent/sbomer/leases");
        let err = store.write(&lease("a")).await.unwrap_err();
        assert!(matches!(err, LeaderError::Io { .. }));
    }

    #[test]
    fn backend_follows_lease_dir() {
        let mut config = LeaderConfig::default();
        assert_eq!(LeaseBackend::from_config(&config).kind(), "memory");
        config.lease_dir = "/var/lib/sbomer".to_owned();
        assert_eq!(LeaseBackend::from_config(&config).kind(), "file");
    }
}
