use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fieldops_core::{FieldOpsError, FieldOpsResult};
use fieldops_domain::ports::FileStorage;
use tracing::{debug, instrument};
use uuid::Uuid;

/// 本地磁盘附件存储
///
/// 目录结构: <root>/<dispatch_id>/<uuid>_<文件名>，
/// 文件名先做清洗，路径分隔符一律替换掉，防止越出根目录。
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sanitize_file_name(file_name: &str) -> String {
        let cleaned: String = file_name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c => c,
            })
            .collect();
        let cleaned = cleaned.replace("..", "_");
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            "unnamed".to_string()
        } else {
            trimmed.to_string()
        }
    }

    fn absolute(&self, storage_path: &str) -> FieldOpsResult<PathBuf> {
        if Path::new(storage_path).is_absolute() || storage_path.contains("..") {
            return Err(FieldOpsError::storage_error(format!(
                "非法的存储路径: {storage_path}"
            )));
        }
        Ok(self.root.join(storage_path))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    #[instrument(skip(self, content), fields(dispatch_id = %dispatch_id, size = content.len()))]
    async fn store(
        &self,
        dispatch_id: Uuid,
        file_name: &str,
        content: Vec<u8>,
    ) -> FieldOpsResult<String> {
        let file_name = Self::sanitize_file_name(file_name);
        let relative = format!("{dispatch_id}/{}_{file_name}", Uuid::new_v4().simple());
        let absolute = self.root.join(&relative);

        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FieldOpsError::storage_error(format!("创建附件目录失败: {e}")))?;
        }
        tokio::fs::write(&absolute, content)
            .await
            .map_err(|e| FieldOpsError::storage_error(format!("写入附件失败: {e}")))?;

        debug!("附件已写入 {}", absolute.display());
        Ok(relative)
    }

    #[instrument(skip(self))]
    async fn load(&self, storage_path: &str) -> FieldOpsResult<Vec<u8>> {
        let absolute = self.absolute(storage_path)?;
        tokio::fs::read(&absolute)
            .await
            .map_err(|e| FieldOpsError::storage_error(format!("读取附件失败: {e}")))
    }

    #[instrument(skip(self))]
    async fn remove(&self, storage_path: &str) -> FieldOpsResult<()> {
        let absolute = self.absolute(storage_path)?;
        match tokio::fs::remove_file(&absolute).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FieldOpsError::storage_error(format!("删除附件失败: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_load_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        let dispatch_id = Uuid::new_v4();

        let path = storage
            .store(dispatch_id, "报告.pdf", b"content".to_vec())
            .await
            .unwrap();
        assert!(path.starts_with(&dispatch_id.to_string()));
        assert!(path.ends_with("报告.pdf"));

        let loaded = storage.load(&path).await.unwrap();
        assert_eq!(loaded, b"content");

        storage.remove(&path).await.unwrap();
        assert!(storage.load(&path).await.is_err());
        // 重复删除不报错
        storage.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_name_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        let path = storage
            .store(Uuid::new_v4(), "../../etc/passwd", b"x".to_vec())
            .await
            .unwrap();
        assert!(!path.contains(".."));

        let loaded = storage.load(&path).await.unwrap();
        assert_eq!(loaded, b"x");
    }

    #[tokio::test]
    async fn test_load_rejects_escaping_path() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        assert!(storage.load("../outside").await.is_err());
        assert!(storage.load("/etc/passwd").await.is_err());
    }
}
