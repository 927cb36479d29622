//! Configuration validation

use common::error::{Error, Result};
use common::types::MAX_SCALE;
use crate::schema::{BackendChoice, ServiceConfig};

/// Validates a service configuration
pub fn validate(config: &ServiceConfig) -> Result<()> {
    let model = &config.model;

    if model.scale == 0 || model.scale > MAX_SCALE {
        return Err(Error::Config(format!(
            "model.scale must be between 1 and {}, got {}",
            MAX_SCALE, model.scale
        )));
    }

    if model.tile_size > 0 && model.tile_pad >= model.tile_size {
        return Err(Error::Config(format!(
            "model.tile_pad ({}) must be smaller than model.tile_size ({})",
            model.tile_pad, model.tile_size
        )));
    }

    if model.backend == BackendChoice::Onnx && model.weights_name.trim().is_empty() {
        return Err(Error::Config("model.weights_name must not be empty".to_string()));
    }

    if let Some(digest) = &model.weights_sha256 {
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::Config(format!(
                "model.weights_sha256 is not a SHA-256 hex digest: {}",
                digest
            )));
        }
    }

    for (key, dir) in [
        ("storage.upload_dir", &config.storage.upload_dir),
        ("storage.output_dir", &config.storage.output_dir),
        ("model.weights_dir", &model.weights_dir),
    ] {
        if dir.as_os_str().is_empty() {
            return Err(Error::Config(format!("{} must not be empty", key)));
        }
    }

    if config.storage.upload_dir == config.storage.output_dir {
        return Err(Error::Config(
            "storage.upload_dir and storage.output_dir must differ".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_scale_bounds_follow_shared_limit() {
        let mut config = ServiceConfig::default();
        config.model.scale = MAX_SCALE;
        assert!(validate(&config).is_ok());
        config.model.scale = MAX_SCALE + 1;
        assert!(validate(&config).is_err());
        config.model.scale = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_tile_pad_must_fit_inside_tile() {
        let mut config = ServiceConfig::default();
        config.model.tile_size = 8;
        config.model.tile_pad = 8;
        assert!(validate(&config).is_err());

        config.model.tile_size = 0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_bad_digest_rejected() {
        let mut config = ServiceConfig::default();
        config.model.weights_sha256 = Some("abc".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_shared_directories_rejected() {
        let mut config = ServiceConfig::default();
        config.storage.output_dir = config.storage.upload_dir.clone();
        assert!(validate(&config).is_err());
    }
}
