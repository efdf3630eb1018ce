//! Upload validation and storage of uploaded files.

use color_eyre::Result;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

/// Extensions accepted for upload (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: [&str; 1] = ["csv"];

/// Why an upload was refused. Display text is the message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    NoFilePart,
    NoSelectedFile,
    DisallowedType,
    InvalidName,
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::NoFilePart => "No file part",
            Self::NoSelectedFile => "No selected file",
            Self::DisallowedType => "Allowed file types are csv",
            Self::InvalidName => "Invalid file name",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for UploadError {}

/// True when `filename` has an allowed extension.
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
        None => false,
    }
}

fn strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("static pattern"))
}

/// Reduce a client-supplied name to a plain file name safe to join onto the upload directory.
///
/// Non-ASCII characters are dropped, path separators become spaces, whitespace runs become
/// `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or trailing `.`/`_` are
/// stripped. The result may be empty.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");
    strip_re()
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Check an uploaded file's name and return the name it will be stored under.
/// `None` means the request carried no `file` part at all.
pub fn validate_upload(filename: Option<&str>) -> std::result::Result<String, UploadError> {
    let filename = filename.ok_or(UploadError::NoFilePart)?;
    if filename.is_empty() {
        return Err(UploadError::NoSelectedFile);
    }
    if !allowed_file(filename) {
        return Err(UploadError::DisallowedType);
    }
    let secured = secure_filename(filename);
    if secured.is_empty() || !allowed_file(&secured) {
        return Err(UploadError::InvalidName);
    }
    Ok(secured)
}

/// Directory holding uploaded files.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` under the (already secured) `filename`, creating the directory if
    /// needed. An existing file of the same name is replaced.
    pub fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(filename);
        std::fs::write(&path, bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "stored upload");
        Ok(path)
    }

    /// Turn a dashboard `file` reference back into a path. Only existing files inside the
    /// upload directory resolve.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        if reference.is_empty() {
            return None;
        }
        let path = PathBuf::from(reference);
        let file = path.canonicalize().ok()?;
        let dir = self.dir.canonicalize().ok()?;
        if file.is_file() && file.starts_with(&dir) {
            Some(path)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_file_checks_last_extension() {
        assert!(allowed_file("data.csv"));
        assert!(allowed_file("DATA.CSV"));
        assert!(allowed_file("archive.tar.csv"));
        assert!(!allowed_file("data.csv.exe"));
        assert!(!allowed_file("csv"));
        assert!(!allowed_file("notes.txt"));
    }

    #[test]
    fn secure_filename_strips_paths_and_symbols() {
        assert_eq!(secure_filename("My cool file.csv"), "My_cool_file.csv");
        assert_eq!(secure_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("..\\evil.csv"), "evil.csv");
        assert_eq!(secure_filename("résumé (1).csv"), "rsum_1.csv");
        assert_eq!(secure_filename("..."), "");
    }

    #[test]
    fn validate_upload_reports_each_problem() {
        assert_eq!(validate_upload(None), Err(UploadError::NoFilePart));
        assert_eq!(validate_upload(Some("")), Err(UploadError::NoSelectedFile));
        assert_eq!(validate_upload(Some("a.txt")), Err(UploadError::DisallowedType));
        assert_eq!(validate_upload(Some("é.csv")), Err(UploadError::InvalidName));
        assert_eq!(validate_upload(Some("a b.csv")), Ok("a_b.csv".to_string()));
    }

    #[test]
    fn messages_match_flash_text() {
        assert_eq!(UploadError::DisallowedType.to_string(), "Allowed file types are csv");
        assert_eq!(UploadError::NoFilePart.to_string(), "No file part");
    }
}
