//! 按扩展名推断 Content-Type

/// 未知类型的兜底值
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 根据文件名推断 Content-Type
///
/// 无扩展名或未知类型时返回 `default_content_type`（若配置），
/// 否则返回 `application/octet-stream`。
pub fn content_type_for(file_name: &str, default_content_type: Option<&str>) -> String {
    let has_extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some();

    if !has_extension {
        return default_content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string();
    }

    let guessed = mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    // 推断不出来时允许配置覆盖兜底值
    if guessed == DEFAULT_CONTENT_TYPE {
        if let Some(fallback) = default_content_type {
            return fallback.to_string();
        }
    }

    guessed.to_string()
}
