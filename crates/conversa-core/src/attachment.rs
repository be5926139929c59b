//! Pending file and image attachments.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};

use crate::error::{ChatError, Result};

/// A text file waiting to be sent with the next message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    pub name: String,
    pub content: String,
}

impl FileAttachment {
    /// Read `path` as text. Files over `max_size` bytes are rejected before
    /// anything is read; content longer than `max_chars` is cut with a
    /// visible notice.
    pub fn load(path: &Path, max_size: u64, max_chars: usize) -> Result<Self> {
        let io_err = |source| ChatError::Attachment {
            path: path.to_path_buf(),
            source,
        };

        let size = fs::metadata(path).map_err(io_err)?.len();
        if size > max_size {
            return Err(ChatError::FileTooLarge {
                size,
                limit: max_size,
            });
        }

        let bytes = fs::read(path).map_err(io_err)?;
        let content = truncate_content(&String::from_utf8_lossy(&bytes), max_chars);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        info!(%name, size, "file attached");
        Ok(Self { name, content })
    }

    pub fn preamble(&self) -> String {
        format!(
            "Instruções para análise do arquivo {}: Por favor, leia e interprete o conteúdo do arquivo anexado.",
            self.name
        )
    }
}

pub fn truncate_content(content: &str, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content.to_string();
    }
    let kept: String = content.chars().take(max_chars).collect();
    debug!(total, max_chars, "file content truncated");
    format!(
        "{}\n\n[Conteúdo truncado. Arquivo original tem {} caracteres]",
        kept, total
    )
}

/// An image waiting to be sent, as a URL the providers understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub url: String,
}

impl ImageAttachment {
    /// Remote URLs are kept as given; anything else is read from disk into a
    /// `data:` URL.
    pub fn load(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Ok(Self {
                url: source.to_string(),
            });
        }

        let path = Path::new(source);
        let bytes = fs::read(path).map_err(|source| ChatError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        info!(%mime, bytes = bytes.len(), "image attached");

        Ok(Self {
            url: format!("data:{};base64,{}", mime.essence_str(), STANDARD.encode(bytes)),
        })
    }
}

/// Split a base64 `data:` URL into its media type and payload.
pub fn split_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let media_type = meta.strip_suffix(";base64")?;
    Some((media_type, data))
}
