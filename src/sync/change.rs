//! 变更检测 - 决定一个本地文件相对远端对象是否“有变化”

use crate::hash::strip_etag_quotes;
use crate::settings::ModifiedCheck;
use crate::storage::{LocalEntry, RemoteObject};

/// 同步方向，决定时间比较的不等号方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// 本地 -> 远端：本地更新才算变化
    Upload,
    /// 远端 -> 本地：远端更新才算变化
    Download,
}

/// 变更检测器
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    check: ModifiedCheck,
    direction: SyncDirection,
}

impl ChangeDetector {
    pub fn new(check: ModifiedCheck, direction: SyncDirection) -> Self {
        Self { check, direction }
    }

    /// 判断是否有变化
    ///
    /// `local_hash` 是调用方按需计算的小写 MD5；Hash 策略下必须提供。
    /// 远端 ETag 去掉引号后比较。
    pub fn is_changed(
        &self,
        local: &LocalEntry,
        local_hash: Option<&str>,
        remote: Option<&RemoteObject>,
    ) -> bool {
        let Some(remote) = remote else {
            // 远端不存在，视为新文件
            return true;
        };

        match self.check {
            ModifiedCheck::Hash => {
                let remote_etag = remote.etag.as_deref().map(strip_etag_quotes);
                match (local_hash, remote_etag) {
                    (Some(local), Some(remote)) => !local.eq_ignore_ascii_case(remote),
                    // 任一侧拿不到哈希时按有变化处理
                    _ => true,
                }
            }
            ModifiedCheck::Date => match self.direction {
                SyncDirection::Upload => local.modified_time > remote.last_modified,
                SyncDirection::Download => local.modified_time < remote.last_modified,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::md5_hex;

    fn local(modified_time: i64) -> LocalEntry {
        LocalEntry {
            path: "/data/a.txt".to_string(),
            size: 3,
            modified_time,
        }
    }

    fn remote(etag: Option<&str>, last_modified: i64) -> RemoteObject {
        RemoteObject {
            key: "a.txt".to_string(),
            etag: etag.map(str::to_string),
            last_modified,
            size: 3,
            storage_class: None,
        }
    }

    #[test]
    fn test_missing_remote_is_changed() {
        let detector = ChangeDetector::new(ModifiedCheck::Hash, SyncDirection::Upload);
        assert!(detector.is_changed(&local(0), Some("abc"), None));
    }

    #[test]
    fn test_hash_comparison_strips_quotes() {
        let detector = ChangeDetector::new(ModifiedCheck::Hash, SyncDirection::Upload);
        let content_hash = md5_hex(b"abc");
        let obj = remote(Some(&format!("\"{}\"", content_hash)), 0);

        assert!(!detector.is_changed(&local(0), Some(&content_hash), Some(&obj)));

        // 内容变一个字节
        let other_hash = md5_hex(b"abd");
        assert!(detector.is_changed(&local(0), Some(&other_hash), Some(&obj)));
    }

    #[test]
    fn test_hash_missing_etag_counts_as_changed() {
        let detector = ChangeDetector::new(ModifiedCheck::Hash, SyncDirection::Upload);
        let obj = remote(None, 0);
        assert!(detector.is_changed(&local(0), Some("abc"), Some(&obj)));
        assert!(detector.is_changed(&local(0), None, Some(&obj)));
    }

    #[test]
    fn test_date_direction_upload() {
        let detector = ChangeDetector::new(ModifiedCheck::Date, SyncDirection::Upload);
        let obj = remote(None, 100);

        assert!(detector.is_changed(&local(200), None, Some(&obj)));
        assert!(!detector.is_changed(&local(100), None, Some(&obj)));
        assert!(!detector.is_changed(&local(50), None, Some(&obj)));
    }

    #[test]
    fn test_date_direction_download() {
        let detector = ChangeDetector::new(ModifiedCheck::Date, SyncDirection::Download);
        let obj = remote(None, 100);

        assert!(detector.is_changed(&local(50), None, Some(&obj)));
        assert!(!detector.is_changed(&local(100), None, Some(&obj)));
        assert!(!detector.is_changed(&local(200), None, Some(&obj)));
    }
}
