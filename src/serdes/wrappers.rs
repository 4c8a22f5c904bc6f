//! Binary wrappers — file and byte payloads that travel as data URLs.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::error::{SerdesError, SerdesResult};

/// MIME type used when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// `data:<mime>;base64,<payload>`
pub fn encode_data_url(mime_type: &str, data: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", STANDARD.encode(data))
}

/// Best-effort MIME type from a file extension.
fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "html" | "htm" => "text/html",
        _ => return None,
    };
    Some(mime)
}

/// File content held in memory, with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrapper {
    data: Vec<u8>,
    mime_type: Option<String>,
}

impl FileWrapper {
    pub fn new(data: Vec<u8>, mime_type: Option<&str>) -> Self {
        Self {
            data,
            mime_type: mime_type.map(str::to_string),
        }
    }

    /// Read a file eagerly. Without an explicit MIME type, one is guessed
    /// from the extension.
    pub fn from_path(path: &Path, mime_type: Option<&str>) -> SerdesResult<Self> {
        let data = std::fs::read(path).map_err(|source| SerdesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mime_type = mime_type.or_else(|| mime_from_extension(path));
        Ok(Self::new(data, mime_type))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type.as_deref().unwrap_or(OCTET_STREAM)
    }

    pub fn get_as_dataurl(&self) -> String {
        encode_data_url(self.mime_type(), &self.data)
    }
}

/// Raw bytes with a MIME type (octet-stream unless told otherwise).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesWrapper {
    data: Vec<u8>,
    mime_type: String,
}

impl BytesWrapper {
    pub fn new(data: Vec<u8>) -> Self {
        Self::with_mime(data, OCTET_STREAM)
    }

    pub fn with_mime(data: Vec<u8>, mime_type: &str) -> Self {
        Self {
            data,
            mime_type: mime_type.to_string(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn get_as_dataurl(&self) -> String {
        encode_data_url(&self.mime_type, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bytes_default_to_octet_stream() {
        let w = BytesWrapper::new(b"hi".to_vec());
        assert_eq!(w.get_as_dataurl(), "data:application/octet-stream;base64,aGk=");
    }

    #[test]
    fn file_wrapper_explicit_mime() {
        let w = FileWrapper::new(vec![0x89, b'P', b'N', b'G'], Some("image/png"));
        assert_eq!(w.get_as_dataurl(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn file_wrapper_from_path_guesses_mime() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "a,b\n1,2\n").unwrap();
        let w = FileWrapper::from_path(file.path(), None).unwrap();
        assert_eq!(w.mime_type(), "text/csv");
        assert_eq!(w.data(), b"a,b\n1,2\n");
        assert!(w.get_as_dataurl().starts_with("data:text/csv;base64,"));
    }

    #[test]
    fn file_wrapper_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        let w = FileWrapper::from_path(file.path(), None).unwrap();
        assert_eq!(w.mime_type(), OCTET_STREAM);
    }

    #[test]
    fn file_wrapper_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = FileWrapper::from_path(&dir.path().join("gone.png"), None).unwrap_err();
        assert!(matches!(err, SerdesError::Io { .. }));
    }
}
