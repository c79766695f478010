//! Client-side checks that run before anything is dispatched.
//!
//! Everything here is a pure predicate over already-collected input; a
//! rejection never touches the network.

use std::path::Path;
use thiserror::Error;

/// Largest file the backend accepts (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// MIME types the upload endpoint can process.
pub const ALLOWED_MIME_TYPES: [&str; 2] = ["text/plain", "application/pdf"];

pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_CONTEXT_CHARS: usize = 8000;

/// Display text is what the user sees in the alert banner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Por favor escribe un mensaje")]
    EmptyMessage,
    #[error("El mensaje no puede superar 4000 caracteres")]
    MessageTooLong { chars: usize },
    #[error("El contexto no puede superar 8000 caracteres")]
    ContextTooLong { chars: usize },
    #[error("Por favor selecciona un archivo")]
    NoFile,
    #[error("El archivo excede el límite de 10MB")]
    FileTooLarge { size: u64 },
    #[error("Solo se admiten archivos PDF y TXT")]
    UnsupportedFileType { mime_type: String },
    #[error("Selecciona un modelo para procesar el archivo con IA")]
    MissingModel,
}

/// Name, size and declared type of a file, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
        }
    }

    /// Describe a file on disk from its metadata only. The MIME type is
    /// guessed from the extension, the way a browser declares it.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            size: metadata.len(),
            mime_type,
        })
    }
}

/// Size is checked before type, so an oversized PDF reports the size limit.
pub fn validate_file(file: &FileDescriptor) -> Result<(), ValidationError> {
    if file.size > MAX_FILE_SIZE {
        return Err(ValidationError::FileTooLarge { size: file.size });
    }
    if !ALLOWED_MIME_TYPES.contains(&file.mime_type.as_str()) {
        return Err(ValidationError::UnsupportedFileType {
            mime_type: file.mime_type.clone(),
        });
    }
    Ok(())
}

/// Returns the trimmed message and the context, `None` when blank.
pub fn validate_chat(
    message: &str,
    context: &str,
) -> Result<(String, Option<String>), ValidationError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let chars = message.chars().count();
    if chars > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong { chars });
    }

    let context = context.trim();
    let chars = context.chars().count();
    if chars > MAX_CONTEXT_CHARS {
        return Err(ValidationError::ContextTooLong { chars });
    }

    let context = (!context.is_empty()).then(|| context.to_string());
    Ok((message.to_string(), context))
}

pub fn validate_upload_options(
    process_with_ai: bool,
    model: Option<&str>,
) -> Result<(), ValidationError> {
    if process_with_ai && model.map_or(true, |m| m.trim().is_empty()) {
        return Err(ValidationError::MissingModel);
    }
    Ok(())
}
