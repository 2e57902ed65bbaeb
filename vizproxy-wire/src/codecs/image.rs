//! Raster images
//!
//! Only pixel data crosses the wire: the image is sent as an array of shape
//! `(height, width)` for single-channel images or `(height, width, channels)`
//! otherwise, and rebuilt from the array's dtype and channel count.

use image::{DynamicImage, ImageBuffer, Pixel};

use crate::codec::{Codec, CodecRegistry, Decoder, Encoder};
use crate::codecs::array::{DType, Element, NdArray};
use crate::error::WireError;
use crate::value::Value;

/// Pixel data of an image as an array
pub fn image_to_array(image: &DynamicImage) -> Result<NdArray, WireError> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let shaped = |channels: usize| {
        if channels == 1 {
            vec![h, w]
        } else {
            vec![h, w, channels]
        }
    };
    match image {
        DynamicImage::ImageLuma8(b) => NdArray::from_elements(&shaped(1), b.as_raw().clone()),
        DynamicImage::ImageLumaA8(b) => NdArray::from_elements(&shaped(2), b.as_raw().clone()),
        DynamicImage::ImageRgb8(b) => NdArray::from_elements(&shaped(3), b.as_raw().clone()),
        DynamicImage::ImageRgba8(b) => NdArray::from_elements(&shaped(4), b.as_raw().clone()),
        DynamicImage::ImageLuma16(b) => NdArray::from_elements(&shaped(1), b.as_raw().clone()),
        DynamicImage::ImageLumaA16(b) => NdArray::from_elements(&shaped(2), b.as_raw().clone()),
        DynamicImage::ImageRgb16(b) => NdArray::from_elements(&shaped(3), b.as_raw().clone()),
        DynamicImage::ImageRgba16(b) => NdArray::from_elements(&shaped(4), b.as_raw().clone()),
        DynamicImage::ImageRgb32F(b) => NdArray::from_elements(&shaped(3), b.as_raw().clone()),
        DynamicImage::ImageRgba32F(b) => NdArray::from_elements(&shaped(4), b.as_raw().clone()),
        other => NdArray::from_elements(&shaped(4), other.to_rgba8().into_raw()),
    }
}

fn buffer<P: Pixel>(
    width: u32,
    height: u32,
    data: Vec<P::Subpixel>,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, WireError> {
    ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| WireError::Decode("pixel buffer does not match image size".to_string()))
}

fn flat<T: Element + Copy>(array: &NdArray) -> Result<Vec<T>, WireError> {
    array
        .view::<T>()
        .map(|a| a.iter().copied().collect())
        .ok_or_else(|| WireError::Decode(format!("unexpected image dtype {}", array.dtype())))
}

/// Rebuild an image from an array shaped like [`image_to_array`] output
pub fn array_to_image(array: &NdArray) -> Result<DynamicImage, WireError> {
    let shape = array.shape();
    let (h, w, channels) = match *shape {
        [h, w] => (h, w, 1),
        [h, w, c] => (h, w, c),
        _ => {
            return Err(WireError::Decode(format!(
                "cannot build an image from shape {:?}",
                shape
            )))
        }
    };
    let dim = |d: usize| {
        u32::try_from(d).map_err(|_| WireError::Decode(format!("image dimension {} too large", d)))
    };
    let (w, h) = (dim(w)?, dim(h)?);

    let image = match (array.dtype(), channels) {
        (DType::Bool, 1) => {
            let data = flat::<bool>(array)?
                .into_iter()
                .map(|on| if on { 255u8 } else { 0 })
                .collect();
            DynamicImage::ImageLuma8(buffer(w, h, data)?)
        }
        (DType::UInt8, 1) => DynamicImage::ImageLuma8(buffer(w, h, flat(array)?)?),
        (DType::UInt8, 2) => DynamicImage::ImageLumaA8(buffer(w, h, flat(array)?)?),
        (DType::UInt8, 3) => DynamicImage::ImageRgb8(buffer(w, h, flat(array)?)?),
        (DType::UInt8, 4) => DynamicImage::ImageRgba8(buffer(w, h, flat(array)?)?),
        (DType::UInt16, 1) => DynamicImage::ImageLuma16(buffer(w, h, flat(array)?)?),
        (DType::UInt16, 2) => DynamicImage::ImageLumaA16(buffer(w, h, flat(array)?)?),
        (DType::UInt16, 3) => DynamicImage::ImageRgb16(buffer(w, h, flat(array)?)?),
        (DType::UInt16, 4) => DynamicImage::ImageRgba16(buffer(w, h, flat(array)?)?),
        (DType::Float32, 3) => DynamicImage::ImageRgb32F(buffer(w, h, flat(array)?)?),
        (DType::Float32, 4) => DynamicImage::ImageRgba32F(buffer(w, h, flat(array)?)?),
        (dtype, channels) => {
            return Err(WireError::Decode(format!(
                "no image mode for {} data with {} channels",
                dtype, channels
            )))
        }
    };
    Ok(image)
}

pub struct ImageCodec;

impl Codec for ImageCodec {
    fn name(&self) -> &'static str {
        "image"
    }

    fn accepts(&self, value: &Value, _registry: &CodecRegistry) -> bool {
        value.downcast_ref::<DynamicImage>().is_some()
    }

    fn encode(&self, value: &Value, enc: &mut Encoder<'_>) -> Result<(), WireError> {
        let image = value
            .downcast_ref::<DynamicImage>()
            .ok_or_else(|| WireError::unencodable(value, value.type_name()))?;
        enc.encode(&Value::ext(image_to_array(image)?))
    }

    fn decode(&self, dec: &mut Decoder<'_>) -> Result<Value, WireError> {
        let nested = dec.decode()?;
        let array = nested
            .downcast_ref::<NdArray>()
            .ok_or_else(|| {
                WireError::Decode(format!("expected image array, found {}", nested.type_name()))
            })?;
        Ok(Value::ext(array_to_image(array)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn round_trip(value: &Value) -> Value {
        let registry = CodecRegistry::standard();
        let bytes = registry.dumps(value).unwrap();
        registry.loads(&bytes).unwrap()
    }

    #[test]
    fn test_rgb_image_round_trip() {
        let img = RgbImage::from_fn(3, 2, |x, y| Rgb([x as u8, y as u8, 200]));
        let value = Value::ext(DynamicImage::ImageRgb8(img));
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_gray_image_is_two_dimensional() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(4, 2, Luma([9])));
        let array = image_to_array(&img).unwrap();
        assert_eq!(array.shape(), &[2, 4]);
        assert_eq!(round_trip(&Value::ext(img.clone())), Value::ext(img));
    }

    #[test]
    fn test_unsupported_channel_count_is_rejected() {
        let array = NdArray::from_elements(&[1, 1, 5], vec![0u8; 5]).unwrap();
        assert!(array_to_image(&array).is_err());
    }
}
