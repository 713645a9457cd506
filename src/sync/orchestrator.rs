//! 传输执行 - 并发调度上传/下载/删除，按条目隔离失败

use crate::compress::gzip_bytes;
use crate::content_type::content_type_for;
use crate::hash::md5_hex_to_content_md5;
use crate::settings::{SyncSettings, UploadSettings};
use crate::storage::{LocalFileSystem, ObjectStore, PutBody, PutOptions};
use crate::sync::planner::TransferItem;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error};

/// 单次传输的进度事件
#[derive(Debug, Clone)]
pub struct TransferProgress {
    pub key: String,
    pub transferred: u64,
    pub total: u64,
}

/// 单个条目的失败记录
#[derive(Debug, Clone)]
pub struct TransferFailure {
    pub key: String,
    pub message: String,
}

/// 一个批次的执行结果
///
/// 批量接口不为条目失败抛错；部分失败通过这里对调用方与测试可见。
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<String>,
    pub failed: Vec<TransferFailure>,
    pub bytes_transferred: u64,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge_item(&mut self, result: std::result::Result<(String, u64), TransferFailure>) {
        match result {
            Ok((key, bytes)) => {
                self.completed.push(key);
                self.bytes_transferred += bytes;
            }
            Err(failure) => {
                error!("传输失败 {}: {}", failure.key, failure.message);
                self.failed.push(failure);
            }
        }
    }
}

/// 传输执行器
///
/// 每个条目派发为一个独立任务，由信号量限制并发；
/// 条目失败被记录后吞掉，不影响同批其他条目。
pub struct TransferOrchestrator {
    store: Arc<dyn ObjectStore>,
    fs: Arc<dyn LocalFileSystem>,
    cancelled: Arc<AtomicBool>,
}

impl TransferOrchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        fs: Arc<dyn LocalFileSystem>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            fs,
            cancelled,
        }
    }

    /// 执行一批上传
    pub async fn execute_uploads(
        &self,
        items: &[TransferItem],
        settings: &SyncSettings,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> BatchReport {
        // 多条目时抑制逐条进度输出，避免交错
        let log_progress = items.len() <= 1;
        let settings = Arc::new(settings.clone());
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_transfers.max(1)));

        let mut handles = Vec::new();

        for item in items {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let store = self.store.clone();
            let fs = self.fs.clone();
            let settings = settings.clone();
            let cancelled = self.cancelled.clone();
            let progress = progress.clone();
            let item = item.clone();

            handles.push(tokio::spawn(async move {
                let result = upload_one(
                    store.as_ref(),
                    fs.as_ref(),
                    &item,
                    &settings,
                    &cancelled,
                    log_progress,
                    progress,
                )
                .await
                .map(|bytes| (item.key.clone(), bytes))
                .map_err(|e| TransferFailure {
                    key: item.key.clone(),
                    message: format!("{:#}", e),
                });
                drop(permit);
                result
            }));
        }

        collect_report(handles).await
    }

    /// 执行一批下载
    pub async fn execute_downloads(
        &self,
        items: &[TransferItem],
        settings: &SyncSettings,
        progress: Option<mpsc::Sender<TransferProgress>>,
    ) -> BatchReport {
        let log_progress = items.len() <= 1;
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_transfers.max(1)));

        let mut handles = Vec::new();

        for item in items {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let store = self.store.clone();
            let fs = self.fs.clone();
            let cancelled = self.cancelled.clone();
            let progress = progress.clone();
            let item = item.clone();

            handles.push(tokio::spawn(async move {
                let result = download_one(
                    store.as_ref(),
                    fs.as_ref(),
                    &item,
                    &cancelled,
                    log_progress,
                    progress,
                )
                .await
                .map(|bytes| (item.key.clone(), bytes))
                .map_err(|e| TransferFailure {
                    key: item.key.clone(),
                    message: format!("{:#}", e),
                });
                drop(permit);
                result
            }));
        }

        collect_report(handles).await
    }

    /// 执行一批远端删除（同步计划内逐个删除）
    pub async fn execute_deletes(&self, keys: &[String], concurrency: usize) -> BatchReport {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut handles = Vec::new();

        for key in keys {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let store = self.store.clone();
            let key = key.clone();

            handles.push(tokio::spawn(async move {
                debug!("删除对象: {}", key);
                let result = store
                    .delete_object(&key, None)
                    .await
                    .map(|_| (key.clone(), 0u64))
                    .map_err(|e| TransferFailure {
                        key,
                        message: format!("{:#}", e),
                    });
                drop(permit);
                result
            }));
        }

        collect_report(handles).await
    }

    /// 执行一批本地删除（下载同步的收尾）
    pub async fn execute_local_deletes(&self, paths: &[String]) -> BatchReport {
        let mut report = BatchReport::default();

        for path in paths {
            if self.cancelled.load(Ordering::SeqCst) {
                break;
            }

            debug!("删除本地文件: {}", path);
            let result = self
                .fs
                .delete(path)
                .await
                .map(|_| (path.clone(), 0u64))
                .map_err(|e| TransferFailure {
                    key: path.clone(),
                    message: format!("{:#}", e),
                });
            report.merge_item(result);
        }
        report
    }
}

/// 等待一批任务并汇总结果
async fn collect_report(
    handles: Vec<tokio::task::JoinHandle<std::result::Result<(String, u64), TransferFailure>>>,
) -> BatchReport {
    let mut report = BatchReport::default();
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok(result) => report.merge_item(result),
            Err(e) => report.merge_item(Err(TransferFailure {
                key: String::new(),
                message: format!("任务失败: {}", e),
            })),
        }
    }
    report
}

/// 构建一次上传的请求体与参数
///
/// 压缩路径把文件读进内存 gzip 后上传；普通路径交给客户端从磁盘
/// 流式读取并自行决定是否分块。
pub(crate) async fn prepare_upload(
    fs: &dyn LocalFileSystem,
    item: &TransferItem,
    upload: &UploadSettings,
    generate_etag: bool,
) -> Result<(PutBody, PutOptions, u64)> {
    let file_name = item
        .local_path
        .rsplit('/')
        .next()
        .unwrap_or(item.local_path.as_str());

    let mut opts = PutOptions {
        cache_control: upload.cache_control.clone(),
        headers: upload.headers.clone(),
        canned_acl: Some(upload.canned_acl),
        storage_class: Some(upload.storage_class),
        ..Default::default()
    };

    if upload.generate_content_type {
        opts.content_type = Some(content_type_for(
            file_name,
            upload.default_content_type.as_deref(),
        ));
    }

    if let Some(ref etag) = item.etag {
        if generate_etag {
            opts.content_md5 = md5_hex_to_content_md5(etag);
        }
        if upload.generate_hash_tag {
            opts.metadata.insert("hashtag".to_string(), etag.clone());
        }
    }

    if upload.should_compress(file_name) {
        let data = fs
            .read(&item.local_path)
            .await
            .with_context(|| format!("读取文件失败: {}", item.local_path))?;
        let compressed = gzip_bytes(&data)?;
        let total = compressed.len() as u64;

        opts.content_encoding = Some("gzip".to_string());
        // 压缩后长度已知，总是显式携带
        opts.content_length = Some(total as i64);

        Ok((PutBody::Bytes(compressed), opts, total))
    } else {
        // 不重读文件，长度来自元数据
        let total = fs
            .stat(&item.local_path)
            .await?
            .map(|m| m.size)
            .unwrap_or(0);

        if upload.generate_content_length && total > 0 {
            opts.content_length = Some(total as i64);
        }

        Ok((
            PutBody::File(PathBuf::from(&item.local_path)),
            opts,
            total,
        ))
    }
}

/// 上传单个条目
async fn upload_one(
    store: &dyn ObjectStore,
    fs: &dyn LocalFileSystem,
    item: &TransferItem,
    settings: &SyncSettings,
    cancelled: &AtomicBool,
    log_progress: bool,
    progress: Option<mpsc::Sender<TransferProgress>>,
) -> Result<u64> {
    if cancelled.load(Ordering::SeqCst) {
        anyhow::bail!("操作已取消");
    }

    let (body, opts, total) =
        prepare_upload(fs, item, &settings.upload, settings.effective_generate_etag()).await?;

    debug!("上传对象 {} ({} 字节)...", item.key, total);
    emit_progress(&progress, item, 0, total).await;

    if cancelled.load(Ordering::SeqCst) {
        anyhow::bail!("操作已取消");
    }

    store.put_object(&item.key, body, &opts).await?;

    emit_progress(&progress, item, total, total).await;
    if log_progress {
        log_percent(total, total);
    }

    Ok(total)
}

/// 下载单个条目
async fn download_one(
    store: &dyn ObjectStore,
    fs: &dyn LocalFileSystem,
    item: &TransferItem,
    cancelled: &AtomicBool,
    log_progress: bool,
    progress: Option<mpsc::Sender<TransferProgress>>,
) -> Result<u64> {
    if cancelled.load(Ordering::SeqCst) {
        anyhow::bail!("操作已取消");
    }

    debug!("下载对象 {} -> {}...", item.key, item.local_path);

    let (data, _) = store
        .get_object(&item.key, None)
        .await?
        .with_context(|| format!("对象不存在: {}", item.key))?;
    let total = data.len() as u64;

    if cancelled.load(Ordering::SeqCst) {
        anyhow::bail!("操作已取消");
    }

    fs.write_all(&item.local_path, &data).await?;

    emit_progress(&progress, item, total, total).await;
    if log_progress {
        log_percent(total, total);
    }

    Ok(total)
}

async fn emit_progress(
    progress: &Option<mpsc::Sender<TransferProgress>>,
    item: &TransferItem,
    transferred: u64,
    total: u64,
) {
    if let Some(tx) = progress {
        let _ = tx
            .send(TransferProgress {
                key: item.key.clone(),
                transferred,
                total,
            })
            .await;
    }
}

/// 输出一行人类可读的进度
fn log_percent(transferred: u64, total: u64) {
    if total == 0 {
        return;
    }
    let percent = transferred as f64 / total as f64 * 100.0;
    debug!("{:.2}% ({}/{})", percent, transferred / 1000, total / 1000);
}
