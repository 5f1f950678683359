//! Frame preprocessing: center square crop, uniform scale to the model
//! input, then CHW float layout.

use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array4;

use crate::logic::model::InferenceError;

/// Build the `[1, 3, size, size]` input tensor for one frame.
///
/// Pixels are scaled to [0, 1]; `mean`/`std` are applied per channel when
/// the model metadata provides them.
pub fn prepare_input(
    image: &RgbImage,
    size: u32,
    mean: Option<[f32; 3]>,
    std: Option<[f32; 3]>,
) -> Result<Array4<f32>, InferenceError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(InferenceError::Preprocess(format!("empty frame ({}x{})", width, height)));
    }
    if size == 0 {
        return Err(InferenceError::Preprocess("model input size is zero".to_string()));
    }

    let std = std.unwrap_or([1.0; 3]);
    if std.iter().any(|s| s.abs() < f32::EPSILON) {
        return Err(InferenceError::Preprocess(format!("invalid channel std {:?}", std)));
    }
    let mean = mean.unwrap_or([0.0; 3]);

    let cropped = scale_and_crop(image, size);

    let side = size as usize;
    let mut input = Array4::<f32>::zeros((1, 3, side, side));
    for (x, y, pixel) in cropped.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            input[[0, c, y as usize, x as usize]] = (value - mean[c]) / std[c];
        }
    }

    Ok(input)
}

/// Crop the center square (shorter side), then resize it to `size`.
/// Cropping first keeps the resize bounded for extreme aspect ratios.
fn scale_and_crop(image: &RgbImage, size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);

    let square = imageops::crop_imm(image, (width - side) / 2, (height - side) / 2, side, side).to_image();
    if side == size {
        square
    } else {
        imageops::resize(&square, size, size, FilterType::Triangle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Left/right quarter green, middle half red
    fn banded(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if x < width / 4 || x >= width * 3 / 4 {
                Rgb([0, 255, 0])
            } else {
                Rgb([255, 0, 0])
            }
        })
    }

    #[test]
    fn test_output_shape() {
        let input = prepare_input(&RgbImage::new(1920, 1440), 224, None, None).unwrap();
        assert_eq!(input.shape(), &[1, 3, 224, 224]);

        let input = prepare_input(&RgbImage::new(100, 60), 224, None, None).unwrap();
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
    }

    #[test]
    fn test_center_crop_keeps_middle() {
        // 448x224 keeps scale 1.0 and crops x in [112, 336): only red remains
        let input = prepare_input(&banded(448, 224), 224, None, None).unwrap();

        for &(y, x) in &[(0usize, 5usize), (100, 112), (223, 218)] {
            assert!((input[[0, 0, y, x]] - 1.0).abs() < 1e-6);
            assert!(input[[0, 1, y, x]].abs() < 1e-6);
        }
    }

    #[test]
    fn test_extreme_aspect_ratio() {
        let tall = RgbImage::from_fn(1, 4000, |_, y| {
            if (1990..2010).contains(&y) { Rgb([255, 0, 0]) } else { Rgb([0, 0, 255]) }
        });
        let input = prepare_input(&tall, 224, None, None).unwrap();
        assert_eq!(input.shape(), &[1, 3, 224, 224]);
        assert!((input[[0, 0, 100, 100]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mean_std_applied() {
        let image = RgbImage::from_pixel(224, 224, Rgb([255, 255, 255]));
        let input = prepare_input(&image, 224, Some([0.5; 3]), Some([0.25; 3])).unwrap();
        assert!((input[[0, 2, 10, 10]] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_frame_is_preprocess_error() {
        match prepare_input(&RgbImage::new(0, 0), 224, None, None) {
            Err(InferenceError::Preprocess(_)) => {}
            other => panic!("Expected Preprocess error, got {:?}", other.map(|a| a.shape().to_vec())),
        }
    }

    #[test]
    fn test_zero_std_rejected() {
        let result = prepare_input(&RgbImage::new(8, 8), 4, None, Some([1.0, 0.0, 1.0]));
        assert!(matches!(result, Err(InferenceError::Preprocess(_))));
    }
}
