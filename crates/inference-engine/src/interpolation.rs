//! Resampling backend
//!
//! Runs without any weight artifact, which makes it the default for
//! development and the backend used throughout the test suite.

use std::fmt;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use ndarray::Array3;

use common::error::{Error, Result};

use crate::backend::InferenceBackend;
use crate::tensor::{ImageTensor, CHANNELS};

const U16_MAX: f32 = u16::MAX as f32;

/// Resampling kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationFilter {
    Nearest,
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl InterpolationFilter {
    fn filter_type(self) -> FilterType {
        match self {
            InterpolationFilter::Nearest => FilterType::Nearest,
            InterpolationFilter::Triangle => FilterType::Triangle,
            InterpolationFilter::CatmullRom => FilterType::CatmullRom,
            InterpolationFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationFilter::Nearest => "nearest",
            InterpolationFilter::Triangle => "triangle",
            InterpolationFilter::CatmullRom => "catmull-rom",
            InterpolationFilter::Lanczos3 => "lanczos3",
        }
    }
}

impl fmt::Display for InterpolationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterpolationFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(InterpolationFilter::Nearest),
            "triangle" | "bilinear" => Ok(InterpolationFilter::Triangle),
            "catmull-rom" | "bicubic" => Ok(InterpolationFilter::CatmullRom),
            "lanczos3" | "lanczos" => Ok(InterpolationFilter::Lanczos3),
            other => Err(Error::InvalidArgument(format!("Unknown filter: {}", other))),
        }
    }
}

/// Backend that upscales tiles with a classical filter
pub struct InterpolationBackend {
    filter: InterpolationFilter,
}

impl InterpolationBackend {
    pub fn new(filter: InterpolationFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> InterpolationFilter {
        self.filter
    }

    /// Exact pixel replication
    fn replicate(tile: &ImageTensor, scale: u32) -> Result<ImageTensor> {
        let src = tile.as_array();
        let s = scale as usize;
        let out_h = tile.height() as usize * s;
        let out_w = tile.width() as usize * s;
        let data = Array3::from_shape_fn((CHANNELS, out_h, out_w), |(c, y, x)| {
            src[[c, y / s, x / s]]
        });
        ImageTensor::from_array(data)
    }

    /// Resamples through a 16-bit RGB buffer
    fn resample(&self, tile: &ImageTensor, scale: u32) -> Result<ImageTensor> {
        let (w, h) = (tile.width(), tile.height());
        let src = tile.as_array();

        let mut interleaved = Vec::with_capacity((w * h) as usize * CHANNELS);
        for y in 0..h as usize {
            for x in 0..w as usize {
                for c in 0..CHANNELS {
                    let v = src[[c, y, x]].clamp(0.0, 1.0);
                    interleaved.push((v * U16_MAX).round() as u16);
                }
            }
        }

        let buffer: ImageBuffer<Rgb<u16>, Vec<u16>> = ImageBuffer::from_raw(w, h, interleaved)
            .ok_or_else(|| Error::Inference("Tile buffer size mismatch".to_string()))?;
        let resized = imageops::resize(&buffer, w * scale, h * scale, self.filter.filter_type());

        let (out_w, out_h) = resized.dimensions();
        let data = Array3::from_shape_fn((CHANNELS, out_h as usize, out_w as usize), |(c, y, x)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32 / U16_MAX
        });
        ImageTensor::from_array(data)
    }
}

impl InferenceBackend for InterpolationBackend {
    fn name(&self) -> &str {
        self.filter.as_str()
    }

    fn enhance(&mut self, tile: &ImageTensor, scale: u32) -> Result<ImageTensor> {
        if scale == 0 {
            return Err(Error::InvalidArgument("Scale must be at least 1".to_string()));
        }
        if tile.width() == 0 || tile.height() == 0 {
            return Err(Error::Inference("Empty tile".to_string()));
        }

        match self.filter {
            InterpolationFilter::Nearest => Self::replicate(tile, scale),
            _ => self.resample(tile, scale),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_nearest_replicates_pixels() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8 * 40, y as u8 * 90, 7]));
        let tile = ImageTensor::from_rgb(&img);
        let mut backend = InterpolationBackend::new(InterpolationFilter::Nearest);

        let out = backend.enhance(&tile, 2).unwrap().to_rgb().unwrap();
        assert_eq!(out.dimensions(), (6, 4));
        assert_eq!(out.get_pixel(5, 3), img.get_pixel(2, 1));
        assert_eq!(out.get_pixel(2, 1), img.get_pixel(1, 0));
    }

    #[test]
    fn test_resample_dimensions() {
        let tile = ImageTensor::from_rgb(&RgbImage::new(5, 3));
        let mut backend = InterpolationBackend::new(InterpolationFilter::Lanczos3);
        let out = backend.enhance(&tile, 4).unwrap();
        assert_eq!((out.width(), out.height()), (20, 12));
    }

    #[test]
    fn test_filter_parsing() {
        assert_eq!("catmull-rom".parse::<InterpolationFilter>().unwrap(), InterpolationFilter::CatmullRom);
        assert_eq!("Lanczos3".parse::<InterpolationFilter>().unwrap(), InterpolationFilter::Lanczos3);
        assert!("sinc".parse::<InterpolationFilter>().is_err());
    }
}
