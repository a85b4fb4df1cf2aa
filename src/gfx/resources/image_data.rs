//! Image decoding for material textures
//!
//! Images are decoded with the `image` crate and expanded to RGBA8 for upload.
//! A texture that fails to decode is replaced by a solid placeholder so a bad
//! asset never aborts scene loading.

use std::path::Path;

use thiserror::Error;

/// Colour used when a texture cannot be decoded.
pub const PLACEHOLDER_COLOR: [u8; 4] = [255, 0, 255, 255];

#[derive(Error, Debug)]
pub enum ImageDataError {
    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("unsupported channel count {0}, expected 3 or 4")]
    UnsupportedChannels(u8),
}

/// Decoded image ready for GPU upload
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// RGBA8 pixel data, rows top to bottom
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Channel count of the source image (3 or 4)
    pub channels: u8,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ImageDataError> {
        let path = path.as_ref();
        log::debug!("Loading image from: {:?}", path);

        let img = image::open(path).map_err(|source| ImageDataError::Decode {
            path: path.display().to_string(),
            source,
        })?;
        let image = Self::from_dynamic(img)?;

        log::info!(
            "Loaded image {}x{} ({} channels) from {:?}",
            image.width,
            image.height,
            image.channels,
            path
        );
        Ok(image)
    }

    /// Load an image from memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageDataError> {
        let img = image::load_from_memory(bytes).map_err(|source| ImageDataError::Decode {
            path: "<memory>".to_string(),
            source,
        })?;
        Self::from_dynamic(img)
    }

    fn from_dynamic(img: image::DynamicImage) -> Result<Self, ImageDataError> {
        let channels = img.color().channel_count();
        if channels != 3 && channels != 4 {
            return Err(ImageDataError::UnsupportedChannels(channels));
        }
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
            channels,
        })
    }

    /// Loads `path`, or returns a placeholder and logs the failure.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::from_file(path).unwrap_or_else(|err| {
            log::warn!("{err}; using placeholder texture");
            Self::placeholder()
        })
    }

    pub fn placeholder() -> Self {
        Self::solid_color(1, 1, PLACEHOLDER_COLOR)
    }

    /// Create a solid color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
            channels: 4,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode_png(img: image::DynamicImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_solid_color_image() {
        let img = ImageData::solid_color(4, 4, [255, 0, 0, 255]);
        assert_eq!(img.size_bytes(), 4 * 4 * 4);
        assert_eq!(&img.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_rgb_image_is_expanded_to_rgba() {
        let rgb = image::RgbImage::from_pixel(2, 1, image::Rgb([10, 20, 30]));
        let img = ImageData::from_bytes(&encode_png(rgb.into())).unwrap();
        assert_eq!(img.channels, 3);
        assert_eq!((img.width, img.height), (2, 1));
        assert_eq!(img.data, vec![10, 20, 30, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn test_grayscale_is_rejected() {
        let gray = image::GrayImage::from_pixel(1, 1, image::Luma([7]));
        assert!(matches!(
            ImageData::from_bytes(&encode_png(gray.into())),
            Err(ImageDataError::UnsupportedChannels(1))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_placeholder() {
        let img = ImageData::load("does/not/exist.png");
        assert_eq!(img, ImageData::placeholder());
        assert_eq!(img.data, PLACEHOLDER_COLOR.to_vec());
    }
}
