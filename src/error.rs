//! 错误类型定义

use thiserror::Error;

/// 同步库的错误分类
///
/// 对象不存在（head/get 404）不属于错误：同步过程中“对象还不存在”
/// 是正常状态，相关接口以 `Ok(None)` 表示。
#[derive(Debug, Error)]
pub enum SyncError {
    /// 配置无效（缺少 bucket/region/密钥等），在任何网络调用前快速失败
    #[error("配置无效: {0}")]
    Config(String),

    /// 计划阶段失败（枚举本地文件或列举远端对象出错），整个同步调用失败
    #[error("同步计划失败: {0:#}")]
    Planning(anyhow::Error),

    /// 单个条目的传输失败，仅从单条目接口向上传播；
    /// 批量接口将其收集进 BatchReport 而不抛出
    #[error("传输失败 {key}: {cause:#}")]
    Transfer { key: String, cause: anyhow::Error },
}

pub type Result<T> = std::result::Result<T, SyncError>;
