//! Upload classification and decoding.
//!
//! Images keep their bytes; documents are decoded to text, dropping any
//! invalid UTF-8 rather than failing the turn.

use std::path::Path;

use parley_core::config::AttachmentConfig;
use parley_core::types::Attachment;

use crate::error::ChatError;

/// A raw file as received from the input surface.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// MIME type declared by the client, if any.
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, declared_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            declared_type,
            bytes,
        }
    }
}

/// Turns uploads into attachments according to [`AttachmentConfig`].
#[derive(Debug, Clone)]
pub struct AttachmentProcessor {
    max_bytes: usize,
    image_extensions: Vec<String>,
    document_extensions: Vec<String>,
}

impl AttachmentProcessor {
    pub fn from_config(config: &AttachmentConfig) -> Self {
        let lower = |exts: &[String]| -> Vec<String> {
            exts.iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect()
        };
        Self {
            max_bytes: config.max_bytes,
            image_extensions: lower(&config.image_extensions),
            document_extensions: lower(&config.document_extensions),
        }
    }

    /// Classify and decode one upload.
    pub fn process(&self, upload: Upload) -> Result<Attachment, ChatError> {
        let ext = extension(&upload.filename)
            .ok_or_else(|| ChatError::UnsupportedAttachment(upload.filename.clone()))?;

        if upload.bytes.len() > self.max_bytes {
            return Err(ChatError::AttachmentTooLarge {
                filename: upload.filename,
                size: upload.bytes.len(),
                limit: self.max_bytes,
            });
        }

        if self.image_extensions.contains(&ext) {
            let media_type = match upload.declared_type {
                Some(ref t) if t.starts_with("image/") => t.clone(),
                _ => guess_type(&upload.filename),
            };
            Ok(Attachment::image(upload.filename, media_type, upload.bytes))
        } else if self.document_extensions.contains(&ext) {
            let media_type = guess_type(&upload.filename);
            let text = decode_dropping_invalid(&upload.bytes);
            Ok(Attachment::document(upload.filename, media_type, text))
        } else {
            Err(ChatError::UnsupportedAttachment(upload.filename))
        }
    }
}

impl Default for AttachmentProcessor {
    fn default() -> Self {
        Self::from_config(&AttachmentConfig::default())
    }
}

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .filter(|e| !e.is_empty())
}

fn guess_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Decode UTF-8, skipping invalid byte sequences instead of replacing them.
fn decode_dropping_invalid(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
