//! 同步计划 - 本地文件集与远端对象集的三路差集

use crate::error::SyncError;
use crate::hash::md5_hex;
use crate::settings::SyncSettings;
use crate::storage::{LocalEntry, LocalFileSystem, ObjectStore, RemoteObject};
use crate::sync::change::{ChangeDetector, SyncDirection};
use crate::sync::key::KeyMapper;
use anyhow::Context;
use std::collections::HashMap;
use tracing::debug;

/// 一个待传输条目：本地路径 + 目标 key + 预先算好的哈希
///
/// 由计划器独占创建，由执行器独占消费。
#[derive(Debug, Clone)]
pub struct TransferItem {
    pub local_path: String,
    pub key: String,
    /// 小写 MD5，避免传输阶段重复读文件计算
    pub etag: Option<String>,
}

/// 同步计划
///
/// 计划完成后 `transfers` 与 `delete_keys` 不相交，且上传/删除/跳过
/// 三者恰好划分本地 key 集与远端 key 集的并集。
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// 待上传（或待下载）的条目
    pub transfers: Vec<TransferItem>,
    /// 待删除的远端 key（下载方向为待删除的本地路径）
    pub delete_keys: Vec<String>,
    /// 需要做缓存失效的 key（新增、覆盖、删除）
    pub changed_keys: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty() && self.delete_keys.is_empty()
    }
}

/// 同步计划器
pub struct SyncPlanner<'a> {
    store: &'a dyn ObjectStore,
    fs: &'a dyn LocalFileSystem,
}

impl<'a> SyncPlanner<'a> {
    pub fn new(store: &'a dyn ObjectStore, fs: &'a dyn LocalFileSystem) -> Self {
        Self { store, fs }
    }

    /// 是否需要在计划阶段计算本地哈希
    fn needs_hash(settings: &SyncSettings, direction: SyncDirection) -> bool {
        match direction {
            SyncDirection::Upload => {
                settings.effective_generate_etag() || settings.upload.generate_hash_tag
            }
            SyncDirection::Download => settings.effective_generate_etag(),
        }
    }

    /// 按需计算本地文件的 MD5
    async fn hash_entry(&self, entry: &LocalEntry) -> Result<String, SyncError> {
        let data = self
            .fs
            .read(&entry.path)
            .await
            .with_context(|| format!("读取文件失败: {}", entry.path))
            .map_err(SyncError::Planning)?;
        Ok(md5_hex(&data))
    }

    /// 上传方向的目录同步计划
    pub async fn plan_upload(
        &self,
        dir: &str,
        settings: &SyncSettings,
    ) -> Result<SyncPlan, SyncError> {
        let mapper = KeyMapper::new(dir, &settings.key_prefix, settings.lower_paths);
        let detector = ChangeDetector::new(settings.modified_check, SyncDirection::Upload);
        let needs_hash = Self::needs_hash(settings, SyncDirection::Upload);

        // 远端对象一次列完，建 key 索引
        let objects = self
            .store
            .list_objects(&settings.key_prefix)
            .await
            .context("列举远端对象失败")
            .map_err(SyncError::Planning)?;
        let mut remote: HashMap<String, RemoteObject> =
            objects.into_iter().map(|o| (o.key.clone(), o)).collect();

        let entries = self
            .fs
            .enumerate(mapper.root(), &settings.search_filter, settings.search_scope)
            .await
            .context("枚举本地文件失败")
            .map_err(SyncError::Planning)?;

        debug!(
            "计划上传同步: 本地 {} 个文件, 远端 {} 个对象",
            entries.len(),
            remote.len()
        );

        let mut plan = SyncPlan::default();

        for entry in entries {
            let key = mapper.path_to_key(&entry.path);

            let etag = if needs_hash {
                Some(self.hash_entry(&entry).await?)
            } else {
                None
            };

            // 匹配到的远端对象无论是否有变化都从工作集移除
            let matched = remote.remove(&key);

            if detector.is_changed(&entry, etag.as_deref(), matched.as_ref()) {
                plan.changed_keys.push(key.clone());
                plan.transfers.push(TransferItem {
                    local_path: entry.path.clone(),
                    key,
                    etag,
                });
            }
        }

        // 工作集剩下的对象没有本地对应，删除
        let mut leftover: Vec<String> = remote.into_keys().collect();
        leftover.sort();
        plan.changed_keys.extend(leftover.iter().cloned());
        plan.delete_keys = leftover;

        debug!(
            "上传计划完成: {} 个上传, {} 个删除",
            plan.transfers.len(),
            plan.delete_keys.len()
        );
        Ok(plan)
    }

    /// 下载方向的目录同步计划
    ///
    /// 角色对调：远端对象驱动循环，未匹配的对象成为新下载，
    /// 未被任何对象匹配的本地文件成为本地删除。
    pub async fn plan_download(
        &self,
        dir: &str,
        settings: &SyncSettings,
    ) -> Result<SyncPlan, SyncError> {
        let mapper = KeyMapper::new(dir, &settings.key_prefix, settings.lower_paths);
        let detector = ChangeDetector::new(settings.modified_check, SyncDirection::Download);
        let needs_hash = Self::needs_hash(settings, SyncDirection::Download);

        let objects = self
            .store
            .list_objects(&settings.key_prefix)
            .await
            .context("列举远端对象失败")
            .map_err(SyncError::Planning)?;

        let entries = self
            .fs
            .enumerate(mapper.root(), &settings.search_filter, settings.search_scope)
            .await
            .context("枚举本地文件失败")
            .map_err(SyncError::Planning)?;

        debug!(
            "计划下载同步: 远端 {} 个对象, 本地 {} 个文件",
            objects.len(),
            entries.len()
        );

        let mut local_by_key: HashMap<String, LocalEntry> = entries
            .into_iter()
            .map(|e| (mapper.path_to_key(&e.path), e))
            .collect();

        let mut plan = SyncPlan::default();

        for obj in objects {
            match local_by_key.remove(&obj.key) {
                Some(entry) => {
                    let etag = if needs_hash {
                        Some(self.hash_entry(&entry).await?)
                    } else {
                        None
                    };

                    if detector.is_changed(&entry, etag.as_deref(), Some(&obj)) {
                        plan.changed_keys.push(obj.key.clone());
                        plan.transfers.push(TransferItem {
                            local_path: entry.path,
                            key: obj.key,
                            etag: None,
                        });
                    }
                }
                None => {
                    // 本地没有对应文件，下载到派生路径
                    plan.changed_keys.push(obj.key.clone());
                    plan.transfers.push(TransferItem {
                        local_path: mapper.key_to_path(&obj.key),
                        key: obj.key,
                        etag: None,
                    });
                }
            }
        }

        // 剩下的本地文件没有远端对应，删除（远端内容未变，不进失效列表）
        let mut leftover: Vec<String> =
            local_by_key.into_values().map(|e| e.path).collect();
        leftover.sort();
        plan.delete_keys = leftover;

        debug!(
            "下载计划完成: {} 个下载, {} 个本地删除",
            plan.transfers.len(),
            plan.delete_keys.len()
        );
        Ok(plan)
    }

    /// 单文件上传同步计划：只 head 一个对象，不做全量列举
    pub async fn plan_upload_file(
        &self,
        path: &str,
        settings: &SyncSettings,
    ) -> Result<SyncPlan, SyncError> {
        let path = path.replace('\\', "/");
        let parent = parent_dir(&path);
        let mapper = KeyMapper::new(&parent, &settings.key_prefix, settings.lower_paths);
        let detector = ChangeDetector::new(settings.modified_check, SyncDirection::Upload);

        let key = mapper.path_to_key(&path);
        let obj = self
            .store
            .head_object(&key, None)
            .await
            .context("获取远端对象失败")
            .map_err(SyncError::Planning)?;

        let meta = self
            .fs
            .stat(&path)
            .await
            .context("获取本地文件失败")
            .map_err(SyncError::Planning)?;

        let mut plan = SyncPlan::default();

        match meta {
            Some(meta) => {
                let entry = LocalEntry {
                    path: path.clone(),
                    size: meta.size,
                    modified_time: meta.modified_time,
                };
                let etag = if Self::needs_hash(settings, SyncDirection::Upload) {
                    Some(self.hash_entry(&entry).await?)
                } else {
                    None
                };

                if detector.is_changed(&entry, etag.as_deref(), obj.as_ref()) {
                    plan.changed_keys.push(key.clone());
                    plan.transfers.push(TransferItem {
                        local_path: path,
                        key,
                        etag,
                    });
                }
            }
            None if obj.is_some() => {
                // 本地已删除而远端还在，删除远端对象
                plan.changed_keys.push(key.clone());
                plan.delete_keys.push(key);
            }
            None => {}
        }

        Ok(plan)
    }

    /// 单文件下载同步计划
    pub async fn plan_download_file(
        &self,
        path: &str,
        settings: &SyncSettings,
    ) -> Result<SyncPlan, SyncError> {
        let path = path.replace('\\', "/");
        let parent = parent_dir(&path);
        let mapper = KeyMapper::new(&parent, &settings.key_prefix, settings.lower_paths);
        let detector = ChangeDetector::new(settings.modified_check, SyncDirection::Download);

        let key = mapper.path_to_key(&path);
        let obj = self
            .store
            .head_object(&key, None)
            .await
            .context("获取远端对象失败")
            .map_err(SyncError::Planning)?;

        let meta = self
            .fs
            .stat(&path)
            .await
            .context("获取本地文件失败")
            .map_err(SyncError::Planning)?;

        let mut plan = SyncPlan::default();

        match (meta, obj) {
            (Some(meta), Some(obj)) => {
                let entry = LocalEntry {
                    path: path.clone(),
                    size: meta.size,
                    modified_time: meta.modified_time,
                };
                let etag = if Self::needs_hash(settings, SyncDirection::Download) {
                    Some(self.hash_entry(&entry).await?)
                } else {
                    None
                };

                if detector.is_changed(&entry, etag.as_deref(), Some(&obj)) {
                    plan.changed_keys.push(key.clone());
                    plan.transfers.push(TransferItem {
                        local_path: path,
                        key,
                        etag: None,
                    });
                }
            }
            (None, Some(obj)) => {
                plan.changed_keys.push(obj.key.clone());
                plan.transfers.push(TransferItem {
                    local_path: mapper.key_to_path(&obj.key),
                    key: obj.key,
                    etag: None,
                });
            }
            (Some(_), None) => {
                // 远端已删除而本地还在，删除本地文件
                plan.changed_keys.push(key.clone());
                plan.delete_keys.push(path);
            }
            (None, None) => {}
        }

        Ok(plan)
    }
}

/// 文件路径的父目录（以 / 结尾）
fn parent_dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => String::new(),
    }
}
