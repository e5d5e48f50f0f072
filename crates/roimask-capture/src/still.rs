use std::path::Path;

use roimask_types::{Result, RoiError};

/// File picked by the user for upload.
#[derive(Debug, Clone)]
pub struct StillImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl StillImage {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn validate(&self, allowed_extensions: &[String]) -> Result<()> {
        validate_upload_name(&self.file_name, allowed_extensions)
    }
}

/// Accepts names whose extension matches one of `allowed_extensions`,
/// ignoring case and a leading dot in the configured values.
pub fn validate_upload_name(file_name: &str, allowed_extensions: &[String]) -> Result<()> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| RoiError::Upload(format!("'{file_name}' has no file extension")))?;

    let allowed = allowed_extensions
        .iter()
        .any(|candidate| candidate.trim_start_matches('.').eq_ignore_ascii_case(&extension));
    if allowed {
        Ok(())
    } else {
        Err(RoiError::Upload(format!(
            "'{file_name}' is not a DICOM file or image ({})",
            allowed_extensions.join(", ")
        )))
    }
}
