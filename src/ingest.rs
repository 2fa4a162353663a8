//! Turning uploaded bytes into an image in display orientation.
//!
//! Bounding boxes from Textract are relative to the image as it is
//! _displayed_, so any EXIF rotation or mirroring has to be applied before we
//! upload the image or do any geometry math.

use std::io::Cursor;

use image::{DynamicImage, ImageDecoder as _, ImageFormat, ImageReader};

use crate::prelude::*;

/// Image types we accept.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];

/// Check that `bytes` contain a supported image, and return its MIME type.
pub fn check_supported_image(bytes: &[u8]) -> Result<&'static str> {
    let mime_type = infer::get(bytes)
        .ok_or_else(|| anyhow!("unknown file type"))?
        .mime_type();
    SUPPORTED_IMAGE_TYPES
        .iter()
        .copied()
        .find(|&supported| supported == mime_type)
        .ok_or_else(|| anyhow!("unsupported MIME type {} (supported: PNG, JPEG)", mime_type))
}

/// Decode an image and apply its EXIF orientation, if any.
#[instrument(level = "debug", skip_all, fields(len = bytes.len()))]
pub fn normalize_orientation(bytes: &[u8]) -> Result<DynamicImage> {
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to read image")?
        .into_decoder()
        .context("failed to create image decoder")?;
    let orientation = decoder
        .orientation()
        .context("failed to read image orientation")?;
    let mut image = DynamicImage::from_decoder(decoder).context("failed to decode image")?;
    debug!(?orientation, "Applying image orientation");
    image.apply_orientation(orientation);
    Ok(image)
}

/// Encode an image as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(png_bytes)
}

#[cfg(test)]
pub(crate) mod tests {
    use image::{GenericImageView as _, Rgb, RgbImage, Rgba};

    use super::*;

    /// A small PNG with a red top-left pixel.
    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        encode_png(&DynamicImage::ImageRgb8(image)).unwrap()
    }

    /// A 64x32 white image whose top-left quadrant is red. The quadrants are
    /// large enough to survive JPEG compression away from their edges.
    fn marked_image() -> RgbImage {
        RgbImage::from_fn(64, 32, |x, y| {
            if x < 32 && y < 16 {
                Rgb([255, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    fn is_red(pixel: Rgba<u8>) -> bool {
        let [r, g, b, _] = pixel.0;
        r > 200 && g < 80 && b < 80
    }

    fn is_white(pixel: Rgba<u8>) -> bool {
        pixel.0[..3].iter().all(|&c| c > 200)
    }

    /// A JPEG with an EXIF APP1 segment setting the orientation.
    fn jpeg_with_orientation(image: RgbImage, orientation: u8) -> Vec<u8> {
        let mut jpeg = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        // Big-endian TIFF header, then one IFD with a single Orientation tag.
        let mut tiff = vec![b'M', b'M', 0, 42, 0, 0, 0, 8];
        tiff.extend_from_slice(&[0, 1]);
        tiff.extend_from_slice(&[0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, orientation, 0, 0]);
        tiff.extend_from_slice(&[0, 0, 0, 0]);
        let mut app1 = vec![0xFF, 0xE1];
        let len = u16::try_from(2 + 6 + tiff.len()).unwrap();
        app1.extend_from_slice(&len.to_be_bytes());
        app1.extend_from_slice(b"Exif\0\0");
        app1.extend_from_slice(&tiff);

        // Insert right after the SOI marker.
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&app1);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn accepts_png_and_jpeg() {
        assert_eq!(check_supported_image(&sample_png(2, 2)).unwrap(), "image/png");
        assert_eq!(
            check_supported_image(&jpeg_with_orientation(RgbImage::new(2, 2), 1)).unwrap(),
            "image/jpeg"
        );
    }

    #[test]
    fn rejects_other_formats() {
        assert!(check_supported_image(b"%PDF-1.7\n").is_err());
        assert!(check_supported_image(b"hello").is_err());
    }

    #[test]
    fn png_without_orientation_is_unchanged() {
        let bytes = sample_png(4, 2);
        let image = normalize_orientation(&bytes).unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(encode_png(&image).unwrap(), bytes);
    }

    #[test]
    fn upright_jpeg_is_unchanged() {
        let image = normalize_orientation(&jpeg_with_orientation(marked_image(), 1)).unwrap();
        assert_eq!(image.dimensions(), (64, 32));
        assert!(is_red(image.get_pixel(16, 8)));
        assert!(is_white(image.get_pixel(48, 8)));
        assert!(is_white(image.get_pixel(16, 24)));
    }

    #[test]
    fn applies_exif_rotation() {
        // Orientation 6 means "rotate 90 degrees clockwise to display", which
        // moves the top-left quadrant to the top right.
        let image = normalize_orientation(&jpeg_with_orientation(marked_image(), 6)).unwrap();
        assert_eq!(image.dimensions(), (32, 64));
        assert!(is_red(image.get_pixel(24, 16)));
        assert!(is_white(image.get_pixel(8, 16)));
        assert!(is_white(image.get_pixel(24, 48)));
        assert!(is_white(image.get_pixel(8, 48)));
    }

    #[test]
    fn applies_exif_mirroring() {
        // Orientation 2 is a horizontal flip.
        let image = normalize_orientation(&jpeg_with_orientation(marked_image(), 2)).unwrap();
        assert_eq!(image.dimensions(), (64, 32));
        assert!(is_red(image.get_pixel(48, 8)));
        assert!(is_white(image.get_pixel(16, 8)));
        assert!(is_white(image.get_pixel(48, 24)));
    }

    #[test]
    fn rejects_undecodable_bytes() {
        assert!(normalize_orientation(b"\x89PNG\r\n\x1a\nnot really").is_err());
    }
}
