//! Image decoding and encoding

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, ImageOutputFormat, RgbImage};
use tracing::debug;

use common::error::{Error, Result};

/// Accepted forms of an input image
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Encoded image file on disk
    Path(PathBuf),
    /// Already decoded image
    Decoded(DynamicImage),
    /// Raw interleaved 8-bit pixels with 1, 3 or 4 channels
    Raw {
        width: u32,
        height: u32,
        channels: u8,
        data: Vec<u8>,
    },
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

impl From<&Path> for ImageInput {
    fn from(path: &Path) -> Self {
        ImageInput::Path(path.to_path_buf())
    }
}

impl From<DynamicImage> for ImageInput {
    fn from(image: DynamicImage) -> Self {
        ImageInput::Decoded(image)
    }
}

impl From<RgbImage> for ImageInput {
    fn from(image: RgbImage) -> Self {
        ImageInput::Decoded(DynamicImage::ImageRgb8(image))
    }
}

impl ImageInput {
    /// Produces an 8-bit RGB image. An alpha channel is dropped.
    pub fn into_rgb(self) -> Result<RgbImage> {
        let image = match self {
            ImageInput::Path(path) => decode_path(&path)?,
            ImageInput::Decoded(image) => image,
            ImageInput::Raw {
                width,
                height,
                channels,
                data,
            } => decode_raw(width, height, channels, data)?,
        };

        if image.width() == 0 || image.height() == 0 {
            return Err(Error::ImageIo("Image has zero width or height".to_string()));
        }

        Ok(image.to_rgb8())
    }
}

fn decode_raw(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<DynamicImage> {
    let expected = width as usize * height as usize * channels as usize;
    if data.len() != expected {
        return Err(Error::ImageIo(format!(
            "Raw buffer holds {} bytes, expected {} for {}x{}x{}",
            data.len(),
            expected,
            width,
            height,
            channels
        )));
    }

    let mismatch = || Error::ImageIo("Raw buffer does not match its dimensions".to_string());
    let image = match channels {
        1 => DynamicImage::ImageLuma8(image::GrayImage::from_raw(width, height, data).ok_or_else(mismatch)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, data).ok_or_else(mismatch)?),
        4 => DynamicImage::ImageRgba8(image::RgbaImage::from_raw(width, height, data).ok_or_else(mismatch)?),
        other => {
            return Err(Error::ImageIo(format!(
                "Unsupported channel count: {}",
                other
            )))
        }
    };
    Ok(image)
}

/// Decodes the image file at `path`. The format is detected from the
/// file's leading bytes; the extension is only a fallback.
pub fn decode_path(path: &Path) -> Result<DynamicImage> {
    debug!("Decoding {}", path.display());
    let failed = |e: &dyn std::fmt::Display| Error::ImageIo(format!("Failed to decode {}: {}", path.display(), e));

    image::io::Reader::open(path)
        .map_err(|e| failed(&e))?
        .with_guessed_format()
        .map_err(|e| failed(&e))?
        .decode()
        .map_err(|e| failed(&e))
}

/// Encodes `image` to `path`, choosing the format from the extension.
///
/// The file is written next to its destination and renamed into place.
pub fn encode_to_path(image: &RgbImage, path: &Path) -> Result<()> {
    let format = ImageFormat::from_path(path)
        .map_err(|e| Error::ImageIo(format!("Cannot infer format of {}: {}", path.display(), e)))?;
    let output_format = ImageOutputFormat::from(format);
    if matches!(output_format, ImageOutputFormat::Unsupported(_)) {
        return Err(Error::ImageIo(format!(
            "Encoding {:?} is not supported ({})",
            format,
            path.display()
        )));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| Error::ImageIo(format!("Cannot write into {}: {}", parent.display(), e)))?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut writer, output_format)
            .map_err(|e| Error::ImageIo(format!("Failed to encode {}: {}", path.display(), e)))?;
        writer
            .flush()
            .map_err(|e| Error::ImageIo(format!("Failed to write {}: {}", path.display(), e)))?;
    }

    temp.persist(path)
        .map_err(|e| Error::ImageIo(format!("Failed to save {}: {}", path.display(), e.error)))?;
    debug!("Wrote {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(())
}
