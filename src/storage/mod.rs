pub mod local;
#[cfg(test)]
pub mod memory;
pub mod s3;

use crate::settings::{CannedAcl, StorageClass, StoreSettings};
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub use local::DiskFileSystem;
pub use s3::S3ObjectStore;

/// 单次批量删除的最大 key 数（存储端的请求上限）
pub const DELETE_BATCH_MAX: usize = 1000;

/// 远端对象
///
/// ETag 保留存储返回的原始形式（带引号），由变更检测去引号后比较。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    pub etag: Option<String>,
    pub last_modified: i64,
    pub size: u64,
    pub storage_class: Option<String>,
}

/// 本地文件条目（一次扫描的不可变快照）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEntry {
    /// 绝对路径，分隔符统一为 /
    pub path: String,
    pub size: u64,
    pub modified_time: i64,
}

/// 本地文件元数据
#[derive(Debug, Clone)]
pub struct LocalMeta {
    pub size: u64,
    pub modified_time: i64,
}

/// 上传内容
#[derive(Debug)]
pub enum PutBody {
    /// 内存中的内容（压缩上传路径）
    Bytes(Vec<u8>),
    /// 磁盘文件，由存储客户端流式读取并自行决定是否分块
    File(PathBuf),
}

/// 单次上传的请求参数（计划阶段构建的不可变快照）
///
/// SSE-C 参数属于连接配置，由存储实现自行附加，不在此处。
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_length: Option<i64>,
    pub cache_control: Option<String>,
    /// base64 编码的 MD5 摘要，随请求做完整性校验
    pub content_md5: Option<String>,
    pub metadata: HashMap<String, String>,
    /// 原样透传的头（仅应用存储端认识的键）
    pub headers: HashMap<String, String>,
    pub canned_acl: Option<CannedAcl>,
    pub storage_class: Option<StorageClass>,
}

/// 对象存储抽象接口
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// 列出指定前缀下的所有对象（内部循环续页标记直到列完）
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>>;

    /// 写入单个对象
    async fn put_object(&self, key: &str, body: PutBody, opts: &PutOptions) -> Result<()>;

    /// 读取对象内容与元信息；不存在返回 None
    async fn get_object(
        &self,
        key: &str,
        version: Option<&str>,
    ) -> Result<Option<(Vec<u8>, RemoteObject)>>;

    /// 获取对象元信息；不存在返回 None
    async fn head_object(&self, key: &str, version: Option<&str>) -> Result<Option<RemoteObject>>;

    /// 获取对象的自定义元数据；不存在返回 None
    async fn get_object_metadata(
        &self,
        key: &str,
        version: Option<&str>,
    ) -> Result<Option<HashMap<String, String>>>;

    /// 删除单个对象
    async fn delete_object(&self, key: &str, version: Option<&str>) -> Result<()>;

    /// 批量删除（调用方保证每批不超过 DELETE_BATCH_MAX）
    async fn delete_objects(&self, keys: &[String]) -> Result<()>;

    /// 生成预签名下载链接
    async fn presign_get(
        &self,
        key: &str,
        version: Option<&str>,
        expires_secs: u64,
    ) -> Result<String>;

    /// 存储名称（用于日志）
    fn name(&self) -> &str;
}

/// 本地文件系统抽象接口
#[async_trait]
pub trait LocalFileSystem: Send + Sync {
    /// 枚举目录下匹配 glob 的文件
    async fn enumerate(
        &self,
        root: &str,
        filter: &str,
        scope: crate::settings::SearchScope,
    ) -> Result<Vec<LocalEntry>>;

    /// 读取整个文件
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// 写入整个文件（临时文件 + 原子重命名）
    async fn write_all(&self, path: &str, data: &[u8]) -> Result<()>;

    /// 获取文件元数据；不存在返回 None
    async fn stat(&self, path: &str) -> Result<Option<LocalMeta>>;

    /// 删除文件
    async fn delete(&self, path: &str) -> Result<()>;

    /// 文件系统名称（用于日志）
    fn name(&self) -> &str;
}

/// 根据配置创建对象存储实例
pub async fn create_object_store(
    settings: &StoreSettings,
) -> Result<Arc<dyn ObjectStore>, crate::error::SyncError> {
    settings.validate()?;
    tracing::info!(
        "初始化对象存储: bucket={}, region={}",
        settings.bucket,
        settings.region
    );
    Ok(Arc::new(S3ObjectStore::new(settings).await) as Arc<dyn ObjectStore>)
}
