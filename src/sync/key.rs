//! 本地路径与远端 key 的双向映射

/// key 派生器
///
/// 大小写折叠规则（上传与下载两个方向一致）：开启 `lower_paths` 时，
/// 路径、根目录与前缀都先小写，派生出的 key 以小写形式存储。
#[derive(Debug, Clone)]
pub struct KeyMapper {
    /// 同步根目录，分隔符统一为 /，以 / 结尾
    root: String,
    prefix: String,
    lower_paths: bool,
}

impl KeyMapper {
    pub fn new(root: &str, prefix: &str, lower_paths: bool) -> Self {
        let mut root = root.replace('\\', "/");
        while root.contains("//") {
            root = root.replace("//", "/");
        }
        if !root.ends_with('/') {
            root.push('/');
        }

        Self {
            root,
            prefix: prefix.to_string(),
            lower_paths,
        }
    }

    /// 规范化后的根目录（以 / 结尾）
    pub fn root(&self) -> &str {
        &self.root
    }

    /// 生效的前缀（lower_paths 时为小写）
    fn effective_prefix(&self) -> String {
        if self.lower_paths {
            self.prefix.to_lowercase()
        } else {
            self.prefix.clone()
        }
    }

    /// 本地路径 -> 远端 key
    ///
    /// 根目录之外的路径不会报错，只会派生出一个不在预期 key 空间内的
    /// key（已知的尖锐边界，调用方自行保证路径在根目录下）。
    pub fn path_to_key(&self, path: &str) -> String {
        let path = path.replace('\\', "/");

        let mut key = if self.lower_paths {
            let lowered = path.to_lowercase();
            let root = self.root.to_lowercase();
            lowered
                .strip_prefix(&root)
                .map(str::to_string)
                .unwrap_or(lowered)
        } else {
            path.strip_prefix(&self.root)
                .map(str::to_string)
                .unwrap_or(path)
        };

        // 修正目录分隔
        while key.contains("//") {
            key = key.replace("//", "/");
        }
        if let Some(stripped) = key.strip_prefix("./") {
            key = stripped.to_string();
        }

        // 前缀按原始字符串拼接，不自动补分隔符
        let prefix = self.effective_prefix();
        if !prefix.is_empty() && !key.starts_with(&prefix) {
            key = format!("{}{}", prefix, key);
        }

        key
    }

    /// 远端 key -> 本地路径
    ///
    /// 去掉派生时拼接的前缀后再与根目录相接，保证与 `path_to_key` 互逆。
    pub fn key_to_path(&self, key: &str) -> String {
        let prefix = self.effective_prefix();
        let relative = key.strip_prefix(&prefix).unwrap_or(key);
        format!("{}{}", self.root, relative.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_key_basic() {
        let mapper = KeyMapper::new("/data/site", "", false);
        assert_eq!(mapper.path_to_key("/data/site/css/app.css"), "css/app.css");
        assert_eq!(mapper.path_to_key("/data/site/index.html"), "index.html");
    }

    #[test]
    fn test_prefix_applied_once() {
        let mapper = KeyMapper::new("/data/site", "assets/", false);
        assert_eq!(mapper.path_to_key("/data/site/a.js"), "assets/a.js");
        // 已有前缀不重复拼接
        assert_eq!(mapper.path_to_key("/data/site/assets/a.js"), "assets/a.js");
    }

    #[test]
    fn test_lower_paths_folds_key_and_prefix() {
        let mapper = KeyMapper::new("/Data/Site", "Assets/", true);
        assert_eq!(mapper.path_to_key("/Data/Site/CSS/App.css"), "assets/css/app.css");
    }

    #[test]
    fn test_double_separator_and_dot_slash() {
        let mapper = KeyMapper::new("/data/site/", "", false);
        assert_eq!(mapper.path_to_key("/data/site/css//app.css"), "css/app.css");

        let mapper = KeyMapper::new("", "", false);
        assert_eq!(mapper.path_to_key("./local.txt"), "local.txt");
    }

    #[test]
    fn test_backslash_normalization() {
        let mapper = KeyMapper::new("C:\\data\\site", "", false);
        assert_eq!(mapper.path_to_key("C:\\data\\site\\img\\logo.png"), "img/logo.png");
    }

    #[test]
    fn test_round_trip() {
        let mapper = KeyMapper::new("/data/site", "assets/", false);
        let path = "/data/site/js/app.js";
        assert_eq!(mapper.key_to_path(&mapper.path_to_key(path)), path);

        // 大小写折叠时，根目录保留原始大小写，相对部分为小写
        let mapper = KeyMapper::new("/Data/Site", "Assets/", true);
        let path = "/Data/Site/JS/App.js";
        let round_tripped = mapper.key_to_path(&mapper.path_to_key(path));
        assert_eq!(round_tripped, "/Data/Site/js/app.js");
        assert!(round_tripped.eq_ignore_ascii_case(path));
    }

    #[test]
    fn test_key_to_path_for_remote_only_key() {
        let mapper = KeyMapper::new("/data/site", "assets/", false);
        assert_eq!(mapper.key_to_path("assets/img/a.png"), "/data/site/img/a.png");
        // 不带前缀的 key 原样相接
        assert_eq!(mapper.key_to_path("img/a.png"), "/data/site/img/a.png");
    }

    #[test]
    fn test_path_outside_root_yields_unexpected_key() {
        let mapper = KeyMapper::new("/data/site", "assets/", false);
        let key = mapper.path_to_key("/other/place/x.txt");
        // 不报错，但 key 带着完整路径
        assert_eq!(key, "assets//other/place/x.txt");
    }
}
