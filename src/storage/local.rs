use super::{LocalEntry, LocalFileSystem, LocalMeta};
use crate::settings::SearchScope;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use walkdir::WalkDir;

/// 基于磁盘的本地文件系统实现
pub struct DiskFileSystem {
    name: String,
}

impl DiskFileSystem {
    pub fn new() -> Self {
        Self {
            name: "local".to_string(),
        }
    }

    /// 规范化路径分隔符（统一使用 /）
    pub fn normalize_path(path: &str) -> String {
        path.replace('\\', "/")
    }

    /// glob 过滤器是否匹配文件名
    ///
    /// 过滤器作用于文件名而非完整路径，大小写不敏感。
    pub(crate) fn matches_filter(file_name: &str, filter: &str) -> bool {
        if filter.is_empty() || filter == "*" || filter == "*.*" {
            return true;
        }

        let name = file_name.to_lowercase();
        let filter = filter.to_lowercase();

        if filter.contains('*') || filter.contains('?') {
            let pattern = regex::escape(&filter).replace("\\*", ".*").replace("\\?", ".");
            if let Ok(re) = regex::Regex::new(&format!("^{}$", pattern)) {
                return re.is_match(&name);
            }
        }

        name == filter
    }
}

impl Default for DiskFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalFileSystem for DiskFileSystem {
    async fn enumerate(
        &self,
        root: &str,
        filter: &str,
        scope: SearchScope,
    ) -> Result<Vec<LocalEntry>> {
        let root = root.to_string();
        let filter = filter.to_string();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let entries: Vec<LocalEntry> = tokio::task::spawn_blocking(move || {
            let mut walker = WalkDir::new(&root).follow_links(false);
            if scope == SearchScope::TopLevelOnly {
                walker = walker.max_depth(1);
            }

            walker
                .into_iter()
                .filter_map(|e| e.ok())
                .filter_map(|entry| {
                    let metadata = entry.metadata().ok()?;
                    if metadata.is_dir() {
                        return None;
                    }

                    let file_name = entry.file_name().to_str()?;
                    if !Self::matches_filter(file_name, &filter) {
                        return None;
                    }

                    let modified = metadata
                        .modified()
                        .ok()?
                        .duration_since(std::time::UNIX_EPOCH)
                        .ok()?
                        .as_secs() as i64;

                    Some(LocalEntry {
                        path: Self::normalize_path(entry.path().to_str()?),
                        size: metadata.len(),
                        modified_time: modified,
                    })
                })
                .collect()
        })
        .await?;

        Ok(entries)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let data = fs::read(path).await?;
        Ok(data)
    }

    async fn write_all(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // 使用临时文件写入，然后原子重命名
        let temp_path = full_path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &full_path).await?;

        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<LocalMeta>> {
        match fs::metadata(path).await {
            Ok(metadata) => {
                if metadata.is_dir() {
                    return Ok(None);
                }
                let modified = metadata
                    .modified()?
                    .duration_since(std::time::UNIX_EPOCH)?
                    .as_secs() as i64;

                Ok(Some(LocalMeta {
                    size: metadata.len(),
                    modified_time: modified,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
