//! 待提取的文档
//!
//! 统一表示上传的 PDF / 图片 / 纯文本，并负责 data URI 的编解码。

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::DocumentError;

pub const MIME_PDF: &str = "application/pdf";

/// 文档输入
#[derive(Debug, Clone)]
pub enum DocumentInput {
    /// `data:<mime>;base64,<data>`
    DataUri(String),
    /// 原始字节
    Bytes { mime: String, bytes: Vec<u8> },
    /// 已渲染好的单页图片
    PageImage { mime: String, bytes: Vec<u8> },
    /// 已提取好的纯文本
    Text(String),
}

/// 解码后的二进制载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Payload {
    pub fn is_pdf(&self) -> bool {
        self.mime == MIME_PDF
    }

    /// 编码为 data URI
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }
}

impl DocumentInput {
    /// 解码为二进制载荷；纯文本返回 `None`
    pub fn payload(&self) -> Result<Option<Payload>, DocumentError> {
        match self {
            DocumentInput::DataUri(uri) => parse_data_uri(uri).map(Some),
            DocumentInput::Bytes { mime, bytes } | DocumentInput::PageImage { mime, bytes } => {
                if mime.trim().is_empty() {
                    return Err(DocumentError::MissingMime);
                }
                Ok(Some(Payload {
                    mime: mime.clone(),
                    bytes: bytes.clone(),
                }))
            }
            DocumentInput::Text(_) => Ok(None),
        }
    }

    /// 从本地文件读取，根据扩展名推断 MIME 类型
    pub async fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_lowercase();
        let read = |source| DocumentError::ReadFailed {
            path: path.display().to_string(),
            source,
        };
        if ext == "txt" {
            let text = tokio::fs::read_to_string(path).await.map_err(read)?;
            return Ok(DocumentInput::Text(text));
        }
        let mime = mime_for_extension(&ext)
            .ok_or_else(|| DocumentError::UnsupportedType(ext.clone()))?;
        let bytes = tokio::fs::read(path).await.map_err(read)?;
        Ok(DocumentInput::Bytes {
            mime: mime.to_string(),
            bytes,
        })
    }
}

/// 扩展名 → MIME
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some(MIME_PDF),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// 解析 `data:<mime>;base64,<data>`
pub fn parse_data_uri(uri: &str) -> Result<Payload, DocumentError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| DocumentError::MalformedDataUri("缺少 data: 前缀".to_string()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| DocumentError::MalformedDataUri("缺少逗号分隔符".to_string()))?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| DocumentError::MalformedDataUri("仅支持 base64 编码".to_string()))?;
    if mime.trim().is_empty() {
        return Err(DocumentError::MissingMime);
    }
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| DocumentError::MalformedDataUri(e.to_string()))?;
    Ok(Payload {
        mime: mime.to_string(),
        bytes,
    })
}
