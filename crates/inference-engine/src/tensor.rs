//! Planar float image tensor
//!
//! [`ImageTensor`] holds an RGB image as a `(3, height, width)` array of
//! `f32` values in `[0, 1]`, the layout super-resolution networks consume.

use half::f16;
use image::RgbImage;
use ndarray::{s, Array3, ArrayView3};
use rayon::prelude::*;

use common::error::{Error, Result};

/// Number of color channels
pub const CHANNELS: usize = 3;

/// RGB image in channel-major float layout
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array3<f32>,
}

impl ImageTensor {
    /// Creates a black tensor of the given size
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            data: Array3::zeros((CHANNELS, height as usize, width as usize)),
        }
    }

    /// Wraps an existing `(3, h, w)` array
    pub fn from_array(data: Array3<f32>) -> Result<Self> {
        if data.shape()[0] != CHANNELS {
            return Err(Error::Inference(format!(
                "Expected {} channels, got {}",
                CHANNELS,
                data.shape()[0]
            )));
        }
        Ok(Self { data })
    }

    /// Builds a tensor from flat channel-major values
    pub fn from_vec(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let shape = (CHANNELS, height as usize, width as usize);
        let data = Array3::from_shape_vec(shape, values).map_err(|e| {
            Error::Inference(format!("Tensor of {}x{} has wrong length: {}", width, height, e))
        })?;
        Ok(Self { data })
    }

    /// Converts 8-bit RGB pixels to normalized floats
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (w, h) = image.dimensions();
        let data = Array3::from_shape_fn((CHANNELS, h as usize, w as usize), |(c, y, x)| {
            image.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Self { data }
    }

    pub fn width(&self) -> u32 {
        self.data.shape()[2] as u32
    }

    pub fn height(&self) -> u32 {
        self.data.shape()[1] as u32
    }

    pub fn as_array(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Converts back to 8-bit RGB, clamping out-of-range values
    pub fn to_rgb(&self) -> Result<RgbImage> {
        let (w, h) = (self.width(), self.height());
        if w == 0 || h == 0 {
            return Err(Error::Inference("Cannot convert an empty tensor".to_string()));
        }

        let row_len = w as usize * CHANNELS;
        let mut buf = vec![0u8; row_len * h as usize];
        let data = &self.data;

        buf.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
            for x in 0..w as usize {
                for c in 0..CHANNELS {
                    let v = data[[c, y, x]].clamp(0.0, 1.0);
                    row[x * CHANNELS + c] = (v * 255.0).round() as u8;
                }
            }
        });

        RgbImage::from_raw(w, h, buf)
            .ok_or_else(|| Error::Internal("RGB buffer size mismatch".to_string()))
    }

    /// Copies out the rectangle at `(x, y)` of size `width` x `height`
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<Self> {
        if x + width > self.width() || y + height > self.height() {
            return Err(Error::Inference(format!(
                "Crop {}x{}+{}+{} exceeds tensor {}x{}",
                width,
                height,
                x,
                y,
                self.width(),
                self.height()
            )));
        }

        let (x, y) = (x as usize, y as usize);
        let view = self
            .data
            .slice(s![.., y..y + height as usize, x..x + width as usize]);
        Ok(Self {
            data: view.to_owned(),
        })
    }

    /// Writes `other` into this tensor with its top-left corner at `(x, y)`
    pub fn paste(&mut self, other: &ImageTensor, x: u32, y: u32) -> Result<()> {
        if x + other.width() > self.width() || y + other.height() > self.height() {
            return Err(Error::Inference(format!(
                "Paste of {}x{} at {},{} exceeds tensor {}x{}",
                other.width(),
                other.height(),
                x,
                y,
                self.width(),
                self.height()
            )));
        }

        let (x, y) = (x as usize, y as usize);
        self.data
            .slice_mut(s![
                ..,
                y..y + other.height() as usize,
                x..x + other.width() as usize
            ])
            .assign(&other.data);
        Ok(())
    }

    /// Extends the tensor on the right and bottom by repeating the last column and row
    pub fn pad_edge(&self, right: u32, bottom: u32) -> Self {
        if right == 0 && bottom == 0 {
            return self.clone();
        }

        let (w, h) = (self.width() as usize, self.height() as usize);
        let last_x = w.saturating_sub(1);
        let last_y = h.saturating_sub(1);
        let data = Array3::from_shape_fn(
            (CHANNELS, h + bottom as usize, w + right as usize),
            |(c, y, x)| self.data[[c, y.min(last_y), x.min(last_x)]],
        );
        Self { data }
    }

    /// Returns the values in channel-major order
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Returns the values converted to half precision
    pub fn to_f16(&self) -> Vec<f16> {
        self.data.iter().map(|v| f16::from_f32(*v)).collect()
    }

    /// Builds a tensor from half-precision channel-major values
    pub fn from_f16(width: u32, height: u32, values: &[f16]) -> Result<Self> {
        Self::from_vec(width, height, values.iter().map(|v| v.to_f32()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 128]))
    }

    #[test]
    fn test_rgb_conversion_is_lossless() {
        let img = gradient(7, 5);
        let tensor = ImageTensor::from_rgb(&img);
        assert_eq!(tensor.width(), 7);
        assert_eq!(tensor.height(), 5);
        assert_eq!(tensor.to_rgb().unwrap(), img);
    }

    #[test]
    fn test_to_rgb_clamps() {
        let tensor = ImageTensor::from_vec(1, 1, vec![-0.5, 2.0, 0.5]).unwrap();
        let img = tensor.to_rgb().unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([0, 255, 128]));
    }

    #[test]
    fn test_crop_and_paste() {
        let tensor = ImageTensor::from_rgb(&gradient(8, 8));
        let piece = tensor.crop(2, 3, 4, 2).unwrap();
        assert_eq!((piece.width(), piece.height()), (4, 2));
        assert_eq!(piece.as_array()[[0, 0, 0]], tensor.as_array()[[0, 3, 2]]);

        let mut canvas = ImageTensor::zeros(8, 8);
        canvas.paste(&piece, 2, 3).unwrap();
        assert_eq!(canvas.as_array()[[1, 4, 5]], tensor.as_array()[[1, 4, 5]]);
        assert_eq!(canvas.as_array()[[1, 0, 0]], 0.0);

        assert!(tensor.crop(6, 0, 4, 1).is_err());
        assert!(canvas.paste(&piece, 6, 0).is_err());
    }

    #[test]
    fn test_pad_edge_replicates() {
        let tensor = ImageTensor::from_rgb(&gradient(3, 2));
        let padded = tensor.pad_edge(2, 1);
        assert_eq!((padded.width(), padded.height()), (5, 3));
        assert_eq!(padded.as_array()[[0, 2, 4]], tensor.as_array()[[0, 1, 2]]);
        assert_eq!(padded.as_array()[[1, 0, 3]], tensor.as_array()[[1, 0, 2]]);
    }

    #[test]
    fn test_half_precision_round_trip() {
        let tensor = ImageTensor::from_rgb(&gradient(4, 4));
        let back = ImageTensor::from_f16(4, 4, &tensor.to_f16()).unwrap();
        assert_eq!(back.to_rgb().unwrap(), tensor.to_rgb().unwrap());
    }
}
