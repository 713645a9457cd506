//! 内容哈希 - MD5 摘要与 ETag 处理

use md5::{Digest, Md5};

/// 计算内容的 MD5，输出小写十六进制（无分隔符）
pub fn md5_hex(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// 计算内容的 MD5 原始摘要（用于 Content-MD5 头的 base64 编码）
pub fn md5_raw(data: &[u8]) -> [u8; 16] {
    Md5::digest(data).into()
}

/// 将小写十六进制的 MD5 转为 Content-MD5 头的 base64 形式
pub fn md5_hex_to_content_md5(hex: &str) -> Option<String> {
    use base64::Engine;

    if hex.len() != 32 {
        return None;
    }
    let mut raw = [0u8; 16];
    for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).ok()?;
        raw[i] = u8::from_str_radix(s, 16).ok()?;
    }
    Some(base64::engine::general_purpose::STANDARD.encode(raw))
}

/// 去掉存储返回的 ETag 两侧的引号
///
/// S3 返回的 ETag 形如 `"d41d8cd98f00b204e9800998ecf8427e"`。
pub fn strip_etag_quotes(etag: &str) -> &str {
    etag.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_md5_hex() {
        // 已知向量
        assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn test_strip_etag_quotes() {
        assert_eq!(strip_etag_quotes("\"abc123\""), "abc123");
        assert_eq!(strip_etag_quotes("abc123"), "abc123");
    }

    #[test]
    fn test_content_md5_known_vector() {
        // 空内容: d41d8cd98f00b204e9800998ecf8427e -> 1B2M2Y8AsgTpgAmY7PhCfg==
        assert_eq!(
            md5_hex_to_content_md5("d41d8cd98f00b204e9800998ecf8427e").as_deref(),
            Some("1B2M2Y8AsgTpgAmY7PhCfg==")
        );
        assert!(md5_hex_to_content_md5("abc").is_none());
    }

    #[test]
    fn test_md5_raw_matches_hex() {
        let raw = md5_raw(b"hello world");
        let hex: String = raw.iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(hex, md5_hex(b"hello world"));
    }
}
