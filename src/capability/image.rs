//! 图片输入归一化
//!
//! 只接受 JPEG / PNG / WebP / GIF（按文件头魔数识别），超过大小上限或无法识别的内容一律 InvalidImage。
//! 指纹用于记忆中的图片引用与已知坏路径判断，不保存原始字节。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;

use crate::core::CapabilityError;
use crate::domain::ImageRef;

/// 默认上传上限：10 MiB
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    bytes: Vec<u8>,
    mime: &'static str,
    fingerprint: String,
}

impl ImageData {
    pub fn from_bytes(bytes: Vec<u8>, max_bytes: usize) -> Result<Self, CapabilityError> {
        if bytes.is_empty() {
            return Err(CapabilityError::invalid_image("empty image"));
        }
        if bytes.len() > max_bytes {
            return Err(CapabilityError::invalid_image(format!(
                "image is {} bytes, limit is {}",
                bytes.len(),
                max_bytes
            )));
        }
        let mime = sniff_mime(&bytes)
            .ok_or_else(|| CapabilityError::invalid_image("unsupported image format"))?;
        let fingerprint = fingerprint(&bytes);
        Ok(Self {
            bytes,
            mime,
            fingerprint,
        })
    }

    /// 接受裸 base64 或 `data:image/...;base64,` URL
    pub fn from_upload(upload: &str, max_bytes: usize) -> Result<Self, CapabilityError> {
        let payload = match upload.trim().strip_prefix("data:") {
            Some(rest) => {
                let (meta, data) = rest
                    .split_once(',')
                    .ok_or_else(|| CapabilityError::invalid_image("malformed data url"))?;
                if !meta.ends_with(";base64") {
                    return Err(CapabilityError::invalid_image("data url is not base64"));
                }
                data
            }
            None => upload.trim(),
        };
        let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64_STANDARD
            .decode(cleaned.as_bytes())
            .map_err(|e| CapabilityError::invalid_image(format!("invalid base64: {e}")))?;
        Self::from_bytes(bytes, max_bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64_STANDARD.encode(&self.bytes))
    }

    pub fn to_ref(&self) -> ImageRef {
        ImageRef {
            fingerprint: self.fingerprint.clone(),
            mime: self.mime.to_string(),
            size_bytes: self.bytes.len(),
        }
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.len().hash(&mut hasher);
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::ErrorKind;

    /// 最小 PNG 头（测试用）
    pub(crate) fn tiny_png() -> Vec<u8> {
        let mut v = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        v.extend_from_slice(b"\x00\x00\x00\x0dIHDR fake pixels");
        v
    }

    #[test]
    fn test_from_bytes_sniffs_png() {
        let img = ImageData::from_bytes(tiny_png(), DEFAULT_MAX_IMAGE_BYTES).unwrap();
        assert_eq!(img.mime(), "image/png");
        assert_eq!(img.fingerprint().len(), 16);
        assert!(img.to_data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_from_bytes_rejects_text_and_oversize() {
        let err = ImageData::from_bytes(b"hello world".to_vec(), DEFAULT_MAX_IMAGE_BYTES).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidImage);
        let err = ImageData::from_bytes(tiny_png(), 4).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidImage);
        let err = ImageData::from_bytes(Vec::new(), DEFAULT_MAX_IMAGE_BYTES).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidImage);
    }

    #[test]
    fn test_from_upload_data_url_and_raw() {
        let encoded = BASE64_STANDARD.encode(tiny_png());
        let a = ImageData::from_upload(&format!("data:image/png;base64,{encoded}"), DEFAULT_MAX_IMAGE_BYTES).unwrap();
        let b = ImageData::from_upload(&encoded, DEFAULT_MAX_IMAGE_BYTES).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(ImageData::from_upload("data:image/png,abc", DEFAULT_MAX_IMAGE_BYTES).is_err());
        assert!(ImageData::from_upload("!!!", DEFAULT_MAX_IMAGE_BYTES).is_err());
    }
}
