use thiserror::Error;

pub type Result<T, E = RoiError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum RoiError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("capture error: {0}")]
    Capture(String),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("geometry error: {0}")]
    Geometry(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upload error: {0}")]
    Upload(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RoiError {
    /// Short status line suitable for showing to a user; never carries raw
    /// transport detail.
    pub fn status_message(&self) -> &'static str {
        match self {
            RoiError::Configuration(_) => "Configuration is invalid.",
            RoiError::Capture(_) => "Could not access the camera.",
            RoiError::Codec(_) => "Could not read the image.",
            RoiError::Geometry(_) => "Image and mask sizes do not match.",
            RoiError::Transport(_) => "Connection to the processing server was lost.",
            RoiError::Upload(_) => "Could not send the file. Please try again.",
            RoiError::Session(_) => "Take a photo or upload an image first.",
            RoiError::Ops(_) | RoiError::Other(_) => {
                "Something went wrong. Please try again."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_message_hides_transport_detail() {
        let err = RoiError::Transport("connection refused (os error 111) at 10.0.0.1:8000".into());
        let status = err.status_message();
        assert!(!status.contains("os error"));
        assert!(err.to_string().contains("os error"));
    }

    #[test]
    fn every_variant_maps_to_a_status_line() {
        let errors = [
            RoiError::Configuration("x".into()),
            RoiError::Capture("x".into()),
            RoiError::Codec("x".into()),
            RoiError::Geometry("x".into()),
            RoiError::Transport("x".into()),
            RoiError::Upload("x".into()),
            RoiError::Session("x".into()),
            RoiError::Ops("x".into()),
            RoiError::Other(anyhow::anyhow!("x")),
        ];
        for err in &errors {
            assert!(!err.status_message().is_empty(), "{err}");
            assert!(!err.status_message().contains('x'), "{err}");
        }
    }
}
