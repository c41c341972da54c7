//! CPU grayscale conversion

use imageproc::image::GrayImage;
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};

use super::{ConvertError, Converter};
use crate::luminance::luma_u8;
use crate::pixels::PixelBuffer;

/// Parallel over output rows on the global rayon pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuConverter;

impl CpuConverter {
    pub fn new() -> Self {
        CpuConverter
    }
}

impl Converter for CpuConverter {
    fn name(&self) -> &str {
        "cpu"
    }

    fn convert(&self, pixels: &PixelBuffer) -> Result<GrayImage, ConvertError> {
        let (width, height) = pixels.dimensions();
        let channels = pixels.channels() as usize;
        let gray_input = pixels.is_gray();
        let mut out = vec![0u8; pixels.len_pixels()];

        out.par_chunks_mut(width as usize)
            .zip(pixels.as_bytes().par_chunks(pixels.row_stride()))
            .for_each(|(dst_row, src_row)| {
                for (dst, px) in dst_row.iter_mut().zip(src_row.chunks_exact(channels)) {
                    *dst = if gray_input {
                        px[0]
                    } else {
                        luma_u8(px[0], px[1], px[2])
                    };
                }
            });

        // length is width * height by construction
        GrayImage::from_raw(width, height, out)
            .ok_or_else(|| ConvertError::Dispatch("output buffer size mismatch".into()))
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn image_strategy() -> impl Strategy<Value = PixelBuffer> {
        (1u32..=24, 1u32..=24, 1u8..=4).prop_flat_map(|(w, h, c)| {
            proptest::collection::vec(any::<u8>(), (w * h * c as u32) as usize)
                .prop_map(move |data| PixelBuffer::new(w, h, c, data).unwrap())
        })
    }

    proptest! {
        /// Property: output has the input's width and height, one channel.
        #[test]
        fn prop_dimensions_preserved(pixels in image_strategy()) {
            let gray = CpuConverter.convert(&pixels).unwrap();
            prop_assert_eq!(gray.dimensions(), pixels.dimensions());
            prop_assert_eq!(gray.as_raw().len(), pixels.len_pixels());
        }

        /// Property: each output byte is the luma of the first three channels.
        #[test]
        fn prop_pixel_is_weighted_sum(pixels in image_strategy()) {
            let gray = CpuConverter.convert(&pixels).unwrap();
            for y in 0..pixels.height() {
                for x in 0..pixels.width() {
                    let px = pixels.pixel(x, y);
                    let expected = if px.len() >= 3 { luma_u8(px[0], px[1], px[2]) } else { px[0] };
                    prop_assert_eq!(gray.get_pixel(x, y)[0], expected);
                }
            }
        }
    }
}
