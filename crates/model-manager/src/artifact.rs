//! Weight artifact description

use serde::{Deserialize, Serialize};

use common::error::{Error, Result};

/// A pretrained parameter file identified by a stable name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightArtifact {
    /// File name inside the weights directory
    pub name: String,

    /// Where to fetch the artifact from when it is not cached
    pub url: Option<String>,

    /// Expected SHA-256 digest, lowercase hex
    pub sha256: Option<String>,
}

impl WeightArtifact {
    /// Creates an artifact with a download source
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: Some(url.into()),
            sha256: None,
        }
    }

    /// Creates an artifact that must already be present locally
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            sha256: None,
        }
    }

    /// Sets the expected digest
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into().to_lowercase());
        self
    }

    /// Checks that the name is a plain file name
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0')
        {
            return Err(Error::Config(format!(
                "Weight artifact name must be a plain file name: {:?}",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_paths() {
        assert!(WeightArtifact::local("RealESRGAN_x4plus.onnx").validate().is_ok());
        assert!(WeightArtifact::local("../escape.onnx").validate().is_err());
        assert!(WeightArtifact::local("").validate().is_err());
        assert!(WeightArtifact::local("..").validate().is_err());
    }

    #[test]
    fn test_digest_is_lowercased() {
        let artifact = WeightArtifact::new("w.onnx", "http://localhost/w.onnx").with_sha256("ABCDEF");
        assert_eq!(artifact.sha256.as_deref(), Some("abcdef"));
    }
}
