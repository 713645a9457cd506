//! bucketsync - 本地目录与对象存储桶的同步库
//!
//! 核心是同步差集引擎：从路径派生 key、按哈希或修改时间检测变更、
//! 计算上传/删除/跳过三个集合，再并发执行传输并按条目隔离失败。
//! 对象存储与本地文件系统都是抽象接口，默认实现分别基于
//! aws-sdk-s3 与本地磁盘。
//!
//! ```no_run
//! use bucketsync::{StoreSettings, SyncEngine, SyncSettings};
//!
//! # async fn run() -> Result<(), bucketsync::SyncError> {
//! let store = StoreSettings {
//!     bucket: "my-site".to_string(),
//!     region: "eu-west-1".to_string(),
//!     ..Default::default()
//! };
//!
//! let engine = SyncEngine::connect(&store).await?;
//! let changed = engine
//!     .sync_upload_dir("./public", &SyncSettings::default(), None)
//!     .await?;
//! println!("需要失效的 key: {:?}", changed);
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod content_type;
pub mod engine;
pub mod error;
pub mod hash;
pub mod logging;
pub mod settings;
pub mod storage;
pub mod sync;

pub use engine::SyncEngine;
pub use error::{Result, SyncError};
pub use settings::{
    CannedAcl, DownloadSettings, EncryptionMethod, ModifiedCheck, SearchScope, StorageClass,
    StoreSettings, SyncSettings, UploadSettings,
};
pub use storage::{
    DiskFileSystem, LocalEntry, LocalFileSystem, ObjectStore, PutBody, PutOptions, RemoteObject,
    S3ObjectStore,
};
pub use sync::{
    BatchReport, ChangeDetector, KeyMapper, SyncDirection, SyncPlan, SyncPlanner, TransferFailure,
    TransferItem, TransferOrchestrator, TransferProgress,
};
