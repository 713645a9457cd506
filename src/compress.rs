//! 上传内容的 gzip 压缩

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// 将内容 gzip 压缩到内存
///
/// 压缩后的长度即上传时的 Content-Length。
pub fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_gzip_roundtrip() {
        let input = b"bucketsync bucketsync bucketsync".repeat(64);
        let compressed = gzip_bytes(&input).unwrap();
        assert!(compressed.len() < input.len());

        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_gzip_empty() {
        let compressed = gzip_bytes(b"").unwrap();
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut output = Vec::new();
        decoder.read_to_end(&mut output).unwrap();
        assert!(output.is_empty());
    }
}
