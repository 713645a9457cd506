//! 同步与传输的配置值对象
//!
//! 采用组合而非继承：`StoreSettings` 按值嵌入 `UploadSettings`，
//! `UploadSettings` 再嵌入 `SyncSettings`。所有配置都是不可变快照，
//! 并发执行时按引用共享，不存在可变共享状态。

use crate::error::SyncError;
use serde::{Deserialize, Serialize};

/// 服务端加密方式（SSE-C）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMethod {
    #[default]
    None,
    Aes256,
}

/// 预设 ACL，原样透传给存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CannedAcl {
    #[default]
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl CannedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            CannedAcl::Private => "private",
            CannedAcl::PublicRead => "public-read",
            CannedAcl::PublicReadWrite => "public-read-write",
            CannedAcl::AuthenticatedRead => "authenticated-read",
            CannedAcl::BucketOwnerRead => "bucket-owner-read",
            CannedAcl::BucketOwnerFullControl => "bucket-owner-full-control",
        }
    }
}

/// 存储类别，原样透传给存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    #[default]
    Standard,
    StandardIa,
    OnezoneIa,
    IntelligentTiering,
    ReducedRedundancy,
    Glacier,
    DeepArchive,
}

impl StorageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::StandardIa => "STANDARD_IA",
            StorageClass::OnezoneIa => "ONEZONE_IA",
            StorageClass::IntelligentTiering => "INTELLIGENT_TIERING",
            StorageClass::ReducedRedundancy => "REDUCED_REDUNDANCY",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }
}

/// 变更检测策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModifiedCheck {
    /// 比较本地 MD5 与远端 ETag
    #[default]
    Hash,
    /// 比较修改时间
    Date,
}

/// 本地文件枚举范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    Recursive,
    TopLevelOnly,
}

/// 对象存储连接配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    pub bucket: String,
    pub region: String,
    /// 静态密钥；两者都为空时回退到环境凭证链
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
    /// S3 兼容服务的自定义端点
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub encryption_method: EncryptionMethod,
    /// SSE-C 客户密钥（base64）
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub encryption_key_md5: Option<String>,
}

impl StoreSettings {
    /// 在任何网络调用之前校验配置
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.bucket.is_empty() {
            return Err(SyncError::Config("bucket 不能为空".to_string()));
        }
        if self.region.is_empty() {
            return Err(SyncError::Config("region 不能为空".to_string()));
        }
        if self.access_key.is_empty() != self.secret_key.is_empty() {
            return Err(SyncError::Config(
                "accessKey 与 secretKey 必须成对配置".to_string(),
            ));
        }
        Ok(())
    }

    /// 是否配置了静态密钥
    pub fn has_static_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    #[serde(flatten)]
    pub store: StoreSettings,

    #[serde(default)]
    pub canned_acl: CannedAcl,
    #[serde(default)]
    pub storage_class: StorageClass,

    /// 按原样附加到每个上传请求的头
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
    /// Cache-Control 头，原样透传
    #[serde(default)]
    pub cache_control: Option<String>,

    /// 是否按扩展名推断 Content-Type
    #[serde(default = "default_true")]
    pub generate_content_type: bool,
    /// 无扩展名或未知类型时使用的 Content-Type
    #[serde(default)]
    pub default_content_type: Option<String>,
    /// 是否显式携带 Content-Length（仅在无需重读文件即可确定时）
    #[serde(default)]
    pub generate_content_length: bool,
    /// 是否计算内容 MD5 并随请求上传
    #[serde(default)]
    pub generate_etag: bool,
    /// 是否写入 hashtag 元数据（独立于 ETag，用于客户端缓存失效）
    #[serde(default)]
    pub generate_hash_tag: bool,

    /// 是否压缩上传内容
    #[serde(default)]
    pub compress_content: bool,
    /// 参与压缩的扩展名（带点，如 ".js"）
    #[serde(default)]
    pub compress_extensions: Vec<String>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            canned_acl: CannedAcl::default(),
            storage_class: StorageClass::default(),
            headers: std::collections::HashMap::new(),
            cache_control: None,
            generate_content_type: default_true(),
            default_content_type: None,
            generate_content_length: false,
            generate_etag: false,
            generate_hash_tag: false,
            compress_content: false,
            compress_extensions: Vec::new(),
        }
    }
}

impl UploadSettings {
    /// 指定扩展名是否走压缩上传路径
    pub fn should_compress(&self, file_name: &str) -> bool {
        if !self.compress_content {
            return false;
        }
        let ext = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        self.compress_extensions
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&ext))
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSettings {
    #[serde(flatten)]
    pub store: StoreSettings,

    /// 仅下载此时间之后修改的对象（Unix 秒）
    #[serde(default)]
    pub modified_since: Option<i64>,
}

/// 同步配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(flatten)]
    pub upload: UploadSettings,

    /// 本地文件过滤（glob）
    #[serde(default = "default_search_filter")]
    pub search_filter: String,
    #[serde(default)]
    pub search_scope: SearchScope,

    /// 派生 key 时统一小写
    #[serde(default = "default_true")]
    pub lower_paths: bool,
    /// 远端 key 前缀
    #[serde(default)]
    pub key_prefix: String,

    #[serde(default)]
    pub modified_check: ModifiedCheck,

    /// 最大并发传输数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_transfers: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            upload: UploadSettings::default(),
            search_filter: default_search_filter(),
            search_scope: SearchScope::default(),
            lower_paths: default_true(),
            key_prefix: String::new(),
            modified_check: ModifiedCheck::default(),
            max_concurrent_transfers: default_max_concurrent(),
        }
    }
}

impl SyncSettings {
    /// Hash 策略隐含 ETag 生成；不改动调用方配置，返回生效值
    pub fn effective_generate_etag(&self) -> bool {
        self.upload.generate_etag || self.modified_check == ModifiedCheck::Hash
    }
}

fn default_true() -> bool {
    true
}

fn default_search_filter() -> String {
    "*".to_string()
}

fn default_max_concurrent() -> usize {
    4
}
