//! 内存实现的存储假件，供引擎与计划器测试使用

use super::{
    LocalEntry, LocalFileSystem, LocalMeta, ObjectStore, PutBody, PutOptions, RemoteObject,
    DELETE_BATCH_MAX,
};
use crate::hash::md5_hex;
use crate::settings::SearchScope;
use crate::storage::local::DiskFileSystem;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
    last_modified: i64,
}

/// 内存对象存储
///
/// ETag 与真实存储一致：带引号的 MD5。记录批量删除的批大小
/// 与每次 put 的请求参数，便于断言。
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    clock: AtomicI64,
    /// PutBody::File 从这里解析路径（默认读真实磁盘）
    file_source: Mutex<Option<std::sync::Arc<MemoryFileSystem>>>,
    pub puts: Mutex<Vec<(String, PutOptions)>>,
    pub delete_batches: Mutex<Vec<usize>>,
    pub deleted_keys: Mutex<Vec<String>>,
    /// put 这些 key 时注入失败
    pub fail_keys: Mutex<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置对象，指定修改时间
    pub fn insert_object(&self, key: &str, data: &[u8], last_modified: i64) {
        let etag = format!("\"{}\"", md5_hex(data));
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                etag,
                last_modified,
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn fail_on(&self, key: &str) {
        self.fail_keys.lock().unwrap().insert(key.to_string());
    }

    /// 让 PutBody::File 从内存文件系统取内容
    pub fn attach_fs(&self, fs: std::sync::Arc<MemoryFileSystem>) {
        *self.file_source.lock().unwrap() = Some(fs);
    }

    fn tick(&self) -> i64 {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1_000_000
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<RemoteObject>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| RemoteObject {
                key: k.clone(),
                etag: Some(o.etag.clone()),
                last_modified: o.last_modified,
                size: o.data.len() as u64,
                storage_class: Some("STANDARD".to_string()),
            })
            .collect())
    }

    async fn put_object(&self, key: &str, body: PutBody, opts: &PutOptions) -> Result<()> {
        if self.fail_keys.lock().unwrap().contains(key) {
            return Err(anyhow!("注入的上传失败: {}", key));
        }

        let data = match body {
            PutBody::Bytes(data) => data,
            PutBody::File(path) => {
                let source = self.file_source.lock().unwrap().clone();
                let path_str = path.to_string_lossy().replace('\\', "/");
                match source.and_then(|fs| fs.read_file(&path_str)) {
                    Some(data) => data,
                    None => std::fs::read(&path)?,
                }
            }
        };

        self.puts.lock().unwrap().push((key.to_string(), opts.clone()));

        let etag = format!("\"{}\"", md5_hex(&data));
        let now = self.tick();
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data,
                etag,
                last_modified: now,
            },
        );
        Ok(())
    }

    async fn get_object(
        &self,
        key: &str,
        _version: Option<&str>,
    ) -> Result<Option<(Vec<u8>, RemoteObject)>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(key).map(|o| {
            (
                o.data.clone(),
                RemoteObject {
                    key: key.to_string(),
                    etag: Some(o.etag.clone()),
                    last_modified: o.last_modified,
                    size: o.data.len() as u64,
                    storage_class: Some("STANDARD".to_string()),
                },
            )
        }))
    }

    async fn head_object(&self, key: &str, _version: Option<&str>) -> Result<Option<RemoteObject>> {
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(key).map(|o| RemoteObject {
            key: key.to_string(),
            etag: Some(o.etag.clone()),
            last_modified: o.last_modified,
            size: o.data.len() as u64,
            storage_class: Some("STANDARD".to_string()),
        }))
    }

    async fn get_object_metadata(
        &self,
        key: &str,
        _version: Option<&str>,
    ) -> Result<Option<HashMap<String, String>>> {
        let puts = self.puts.lock().unwrap();
        if !self.objects.lock().unwrap().contains_key(key) {
            return Ok(None);
        }
        let metadata = puts
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, o)| o.metadata.clone())
            .unwrap_or_default();
        Ok(Some(metadata))
    }

    async fn delete_object(&self, key: &str, _version: Option<&str>) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        self.deleted_keys.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<()> {
        if keys.len() > DELETE_BATCH_MAX {
            return Err(anyhow!("单次批量删除最多 {} 个 key", DELETE_BATCH_MAX));
        }
        self.delete_batches.lock().unwrap().push(keys.len());
        let mut objects = self.objects.lock().unwrap();
        let mut deleted = self.deleted_keys.lock().unwrap();
        for key in keys {
            objects.remove(key);
            deleted.push(key.clone());
        }
        Ok(())
    }

    async fn presign_get(
        &self,
        key: &str,
        _version: Option<&str>,
        expires_secs: u64,
    ) -> Result<String> {
        Ok(format!("memory://{}?expires={}", key, expires_secs))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// 内存本地文件系统
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<String, (Vec<u8>, i64)>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置文件，指定修改时间
    pub fn insert_file(&self, path: &str, data: &[u8], modified_time: i64) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), (data.to_vec(), modified_time));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }

    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).map(|(d, _)| d.clone())
    }
}

#[async_trait]
impl LocalFileSystem for MemoryFileSystem {
    async fn enumerate(
        &self,
        root: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<LocalEntry>> {
        let root = root.trim_end_matches('/');
        let files = self.files.lock().unwrap();
        Ok(files
            .iter()
            .filter(|(path, _)| path.starts_with(&format!("{}/", root)))
            .filter(|(path, _)| {
                let relative = &path[root.len() + 1..];
                if scope == SearchScope::TopLevelOnly && relative.contains('/') {
                    return false;
                }
                let file_name = relative.rsplit('/').next().unwrap_or(relative);
                DiskFileSystem::matches_filter(file_name, filter)
            })
            .map(|(path, (data, mtime))| LocalEntry {
                path: path.clone(),
                size: data.len() as u64,
                modified_time: *mtime,
            })
            .collect())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|(d, _)| d.clone())
            .ok_or_else(|| anyhow!("文件不存在: {}", path))
    }

    async fn write_all(&self, path: &str, data: &[u8]) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let mtime = files.get(path).map(|(_, t)| t + 1).unwrap_or(1);
        files.insert(path.to_string(), (data.to_vec(), mtime));
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<LocalMeta>> {
        let files = self.files.lock().unwrap();
        Ok(files.get(path).map(|(data, mtime)| LocalMeta {
            size: data.len() as u64,
            modified_time: *mtime,
        }))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
