//! 基础设施端口

use async_trait::async_trait;
use fieldops_core::FieldOpsResult;
use uuid::Uuid;

/// 附件文件存储端口：接收字节流与元数据，返回存储路径
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(
        &self,
        dispatch_id: Uuid,
        file_name: &str,
        content: Vec<u8>,
    ) -> FieldOpsResult<String>;
    async fn load(&self, storage_path: &str) -> FieldOpsResult<Vec<u8>>;
    async fn remove(&self, storage_path: &str) -> FieldOpsResult<()>;
}
