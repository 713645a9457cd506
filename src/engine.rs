//! 同步引擎 - 对外的操作入口

use crate::error::{Result, SyncError};
use crate::settings::{DownloadSettings, StoreSettings, SyncSettings, UploadSettings};
use crate::storage::{
    create_object_store, DiskFileSystem, LocalFileSystem, ObjectStore, PutBody, PutOptions,
    RemoteObject, DELETE_BATCH_MAX,
};
use crate::sync::orchestrator::{prepare_upload, TransferOrchestrator, TransferProgress};
use crate::sync::planner::{SyncPlanner, TransferItem};
use anyhow::Context;
use base64::Engine as _;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 同步引擎
///
/// 持有对象存储与本地文件系统两个协作方；所有批量操作
/// 对单条目失败只记录不抛出，重跑同步即重试。
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    fs: Arc<dyn LocalFileSystem>,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ObjectStore>, fs: Arc<dyn LocalFileSystem>) -> Self {
        Self {
            store,
            fs,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 校验配置并连接 S3 存储
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let store = create_object_store(settings).await?;
        Ok(Self::new(store, Arc::new(DiskFileSystem::new())))
    }

    /// 取消当前同步；未开始的条目跳过，在途条目按失败处理
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn planner(&self) -> SyncPlanner<'_> {
        SyncPlanner::new(self.store.as_ref(), self.fs.as_ref())
    }

    fn orchestrator(&self) -> TransferOrchestrator {
        TransferOrchestrator::new(self.store.clone(), self.fs.clone(), self.cancelled.clone())
    }

    /// 目录上传同步
    ///
    /// 返回需要做缓存失效的 key 列表（新增、覆盖、删除）。
    pub async fn sync_upload_dir(
        &self,
        dir: &str,
        settings: &SyncSettings,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> Result<Vec<String>> {
        self.cancelled.store(false, Ordering::SeqCst);

        let plan = self.planner().plan_upload(dir, settings).await?;
        info!(
            "上传同步 {}: {} 个上传, {} 个删除",
            dir,
            plan.transfers.len(),
            plan.delete_keys.len()
        );

        let orchestrator = self.orchestrator();
        let report = orchestrator
            .execute_uploads(&plan.transfers, settings, progress)
            .await;
        let delete_report = orchestrator
            .execute_deletes(&plan.delete_keys, settings.max_concurrent_transfers)
            .await;

        if !report.all_succeeded() || !delete_report.all_succeeded() {
            warn!(
                "上传同步部分失败: {} 个上传失败, {} 个删除失败",
                report.failed.len(),
                delete_report.failed.len()
            );
        }
        info!(
            "上传同步完成: {} 个上传, {} 个删除, 传输 {} 字节",
            report.completed.len(),
            delete_report.completed.len(),
            report.bytes_transferred
        );

        Ok(plan.changed_keys)
    }

    /// 目录下载同步
    pub async fn sync_download_dir(
        &self,
        dir: &str,
        settings: &SyncSettings,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> Result<Vec<String>> {
        self.cancelled.store(false, Ordering::SeqCst);

        let plan = self.planner().plan_download(dir, settings).await?;
        info!(
            "下载同步 {}: {} 个下载, {} 个本地删除",
            dir,
            plan.transfers.len(),
            plan.delete_keys.len()
        );

        let orchestrator = self.orchestrator();
        let report = orchestrator
            .execute_downloads(&plan.transfers, settings, progress)
            .await;
        let delete_report = orchestrator.execute_local_deletes(&plan.delete_keys).await;

        if !report.all_succeeded() || !delete_report.all_succeeded() {
            warn!(
                "下载同步部分失败: {} 个下载失败, {} 个删除失败",
                report.failed.len(),
                delete_report.failed.len()
            );
        }

        Ok(plan.changed_keys)
    }

    /// 单文件上传同步；没有任何变化时返回 None
    pub async fn sync_upload_file(
        &self,
        path: &str,
        settings: &SyncSettings,
    ) -> Result<Option<String>> {
        self.cancelled.store(false, Ordering::SeqCst);

        let plan = self.planner().plan_upload_file(path, settings).await?;
        let orchestrator = self.orchestrator();

        if !plan.transfers.is_empty() {
            orchestrator
                .execute_uploads(&plan.transfers, settings, None)
                .await;
        }
        if !plan.delete_keys.is_empty() {
            orchestrator
                .execute_deletes(&plan.delete_keys, settings.max_concurrent_transfers)
                .await;
        }

        Ok(plan.changed_keys.into_iter().next())
    }

    /// 单文件下载同步；没有任何变化时返回 None
    pub async fn sync_download_file(
        &self,
        path: &str,
        settings: &SyncSettings,
    ) -> Result<Option<String>> {
        self.cancelled.store(false, Ordering::SeqCst);

        let plan = self.planner().plan_download_file(path, settings).await?;
        let orchestrator = self.orchestrator();

        if !plan.transfers.is_empty() {
            orchestrator
                .execute_downloads(&plan.transfers, settings, None)
                .await;
        }
        if !plan.delete_keys.is_empty() {
            orchestrator.execute_local_deletes(&plan.delete_keys).await;
        }

        Ok(plan.changed_keys.into_iter().next())
    }

    /// 上传单个文件到指定 key；失败向上抛出
    pub async fn upload(&self, path: &str, key: &str, settings: &UploadSettings) -> Result<()> {
        let path = path.replace('\\', "/");

        let etag = if settings.generate_etag || settings.generate_hash_tag {
            let data = self
                .fs
                .read(&path)
                .await
                .with_context(|| format!("读取文件失败: {}", path))
                .map_err(|e| SyncError::Transfer {
                    key: key.to_string(),
                    cause: e,
                })?;
            Some(crate::hash::md5_hex(&data))
        } else {
            None
        };

        let item = TransferItem {
            local_path: path,
            key: key.to_string(),
            etag,
        };

        let (body, opts, total) = prepare_upload(
            self.fs.as_ref(),
            &item,
            settings,
            settings.generate_etag,
        )
        .await
        .map_err(|e| SyncError::Transfer {
            key: key.to_string(),
            cause: e,
        })?;

        debug!("上传对象 {} ({} 字节)...", key, total);
        self.store
            .put_object(key, body, &opts)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }

    /// 上传内存内容到指定 key
    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        settings: &UploadSettings,
    ) -> Result<()> {
        let opts = PutOptions {
            cache_control: settings.cache_control.clone(),
            headers: settings.headers.clone(),
            canned_acl: Some(settings.canned_acl),
            storage_class: Some(settings.storage_class),
            ..Default::default()
        };

        debug!("上传对象 {} ({} 字节)...", key, data.len());
        self.store
            .put_object(key, PutBody::Bytes(data), &opts)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }

    /// 下载对象写入本地文件；对象不存在视为该条目的失败
    pub async fn download(
        &self,
        path: &str,
        key: &str,
        version: Option<&str>,
        settings: &DownloadSettings,
    ) -> Result<()> {
        let (data, object) = self
            .store
            .get_object(key, version)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })?
            .ok_or_else(|| SyncError::Transfer {
                key: key.to_string(),
                cause: anyhow::anyhow!("对象不存在"),
            })?;

        // 早于 modifiedSince 的对象跳过写入
        if let Some(since) = settings.modified_since {
            if object.last_modified <= since {
                debug!("对象 {} 未变化, 跳过下载", key);
                return Ok(());
            }
        }

        self.fs
            .write_all(path, &data)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }

    /// 读取对象内容；不存在返回 None
    pub async fn get_bytes(
        &self,
        key: &str,
        version: Option<&str>,
        _settings: &DownloadSettings,
    ) -> Result<Option<Vec<u8>>> {
        let result = self
            .store
            .get_object(key, version)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })?;
        Ok(result.map(|(data, _)| data))
    }

    /// 获取对象条目；不存在返回 None
    pub async fn get_object(&self, key: &str, version: Option<&str>) -> Result<Option<RemoteObject>> {
        self.store
            .head_object(key, version)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }

    /// 获取对象自定义元数据；不存在返回 None
    pub async fn get_object_metadata(
        &self,
        key: &str,
        version: Option<&str>,
    ) -> Result<Option<HashMap<String, String>>> {
        self.store
            .get_object_metadata(key, version)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }

    /// 列出指定前缀下的所有对象
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        self.store
            .list_objects(prefix)
            .await
            .context("列举远端对象失败")
            .map_err(SyncError::Planning)
    }

    /// 删除单个对象
    pub async fn delete(&self, key: &str, version: Option<&str>) -> Result<()> {
        debug!("删除对象: {}", key);
        self.store
            .delete_object(key, version)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }

    /// 删除前缀下的所有对象
    ///
    /// `older_than` 限定只删早于该时间的对象；
    /// 按存储上限分批删除，返回实际删除的 key。
    pub async fn delete_all(
        &self,
        prefix: &str,
        older_than: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<String>> {
        let objects = self
            .store
            .list_objects(prefix)
            .await
            .context("列举远端对象失败")
            .map_err(SyncError::Planning)?;

        let cutoff = older_than.map(|t| t.timestamp());
        let keys: Vec<String> = objects
            .into_iter()
            .filter(|o| cutoff.map_or(true, |cutoff| o.last_modified < cutoff))
            .map(|o| o.key)
            .collect();

        info!("批量删除: 前缀 {:?}, 共 {} 个对象", prefix, keys.len());

        let mut deleted = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(DELETE_BATCH_MAX) {
            for key in chunk {
                debug!("删除对象: {}", key);
            }
            match self.store.delete_objects(chunk).await {
                Ok(()) => deleted.extend_from_slice(chunk),
                Err(e) => {
                    // 批次失败不影响后续批次，重跑即重试
                    tracing::error!("批量删除失败 ({} 个 key): {:#}", chunk.len(), e);
                }
            }
        }

        Ok(deleted)
    }

    /// 生成 base64 编码的随机加密密钥并写入文件
    pub async fn generate_encryption_key(&self, path: &str, size_bits: usize) -> Result<()> {
        if size_bits == 0 || size_bits % 8 != 0 || size_bits > 512 {
            return Err(SyncError::Config(format!(
                "无效的密钥长度: {} 位",
                size_bits
            )));
        }

        let mut key = vec![0u8; size_bits / 8];
        rand::thread_rng().fill_bytes(&mut key);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&key);

        self.fs
            .write_all(path, encoded.as_bytes())
            .await
            .map_err(|e| SyncError::Transfer {
                key: path.to_string(),
                cause: e,
            })
    }

    /// 生成预签名下载链接
    pub async fn get_presigned_url(
        &self,
        key: &str,
        version: Option<&str>,
        expires_secs: u64,
    ) -> Result<String> {
        self.store
            .presign_get(key, version, expires_secs)
            .await
            .map_err(|e| SyncError::Transfer {
                key: key.to_string(),
                cause: e,
            })
    }
}
