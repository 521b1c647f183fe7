//! Writes image batches as a grid, like torchvision's `save_image`.
use crate::result::Result;
use anyhow::{bail, ensure, Context};
use candle_core::{DType, Device, Tensor};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::Path;

/// Pixels between and around the images.
pub const PADDING: usize = 2;

/// The (width, height) of a grid of `n` images of `height` x `width`, with `nrow` images per row.
pub fn grid_dim(n: usize, nrow: usize, height: usize, width: usize) -> (usize, usize) {
    let xmaps = nrow.min(n);
    let ymaps = if xmaps == 0 { 0 } else { (n + xmaps - 1) / xmaps };
    (
        xmaps * (width + PADDING) + PADDING,
        ymaps * (height + PADDING) + PADDING,
    )
}

fn to_byte(x: f32) -> u8 {
    (x * 255. + 0.5).clamp(0., 255.) as u8
}

/// Arranges `images` (\[n, channels, height, width\], values in \[0, 1\]) into a grid with `nrow` images per row.
///
/// **Errors**
/// - `images` is empty or not 4 dimensional.
/// - `nrow` is 0.
/// - The number of channels is not 1 or 3.
pub fn make_grid(images: &Tensor, nrow: usize) -> Result<DynamicImage> {
    let (n, c, h, w) = images.dims4()?;
    ensure!(n > 0, "no images");
    ensure!(nrow > 0, "nrow must be greater than 0");
    let values = images
        .to_device(&Device::Cpu)?
        .to_dtype(DType::F32)?
        .flatten_all()?
        .to_vec1::<f32>()?;
    let xmaps = nrow.min(n);
    let (grid_w, grid_h) = grid_dim(n, nrow, h, w);
    let mut buffer = vec![0u8; grid_w * grid_h * c];
    for (i, image) in values.chunks_exact(c * h * w).enumerate() {
        let x0 = (i % xmaps) * (w + PADDING) + PADDING;
        let y0 = (i / xmaps) * (h + PADDING) + PADDING;
        for ch in 0..c {
            for y in 0..h {
                for x in 0..w {
                    buffer[((y0 + y) * grid_w + x0 + x) * c + ch] = to_byte(image[(ch * h + y) * w + x]);
                }
            }
        }
    }
    let (grid_w, grid_h) = (grid_w as u32, grid_h as u32);
    let image = match c {
        1 => DynamicImage::ImageLuma8(
            GrayImage::from_raw(grid_w, grid_h, buffer).context("grid buffer too small")?,
        ),
        3 => DynamicImage::ImageRgb8(
            RgbImage::from_raw(grid_w, grid_h, buffer).context("grid buffer too small")?,
        ),
        _ => bail!("expected 1 or 3 channels, found {c}"),
    };
    Ok(image)
}

/// Saves `images` as a grid with `nrow` images per row, see [`make_grid()`].
///
/// The format is determined by the extension of `path`.
pub fn save_image(images: &Tensor, nrow: usize, path: &Path) -> Result<()> {
    make_grid(images, nrow)?
        .save(path)
        .with_context(|| format!("saving {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dim_full() {
        assert_eq!(grid_dim(64, 8, 28, 28), (242, 242));
    }

    #[test]
    fn grid_dim_partial() {
        assert_eq!(grid_dim(2, 8, 28, 28), (62, 32));
        assert_eq!(grid_dim(9, 8, 28, 28), (242, 62));
    }

    #[test]
    fn grid_pixels() -> Result<()> {
        let images = Tensor::ones((2, 1, 4, 4), DType::F32, &Device::Cpu)?;
        let grid = make_grid(&images, 8)?.into_luma8();
        assert_eq!(grid.dimensions(), (14, 8));
        assert_eq!(grid.get_pixel(0, 0).0, [0]);
        assert_eq!(grid.get_pixel(2, 2).0, [255]);
        assert_eq!(grid.get_pixel(6, 2).0, [0]);
        assert_eq!(grid.get_pixel(8, 5).0, [255]);
        Ok(())
    }

    #[test]
    fn grid_clamps() {
        assert_eq!(to_byte(-1.), 0);
        assert_eq!(to_byte(0.5), 128);
        assert_eq!(to_byte(2.), 255);
    }

    #[test]
    fn grid_channels() -> Result<()> {
        let images = Tensor::zeros((1, 2, 4, 4), DType::F32, &Device::Cpu)?;
        assert!(make_grid(&images, 8).is_err());
        let images = Tensor::zeros((1, 3, 4, 4), DType::F32, &Device::Cpu)?;
        assert_eq!(make_grid(&images, 8)?.into_rgb8().dimensions(), (8, 8));
        Ok(())
    }

    #[test]
    fn save_png() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("01.png");
        let images = Tensor::rand(0f32, 1., (3, 1, 28, 28), &Device::Cpu)?;
        save_image(&images, 8, &path)?;
        let image = image::open(&path)?;
        assert_eq!((image.width(), image.height()), (92, 32));
        Ok(())
    }
}
