//! Image datasets and batching.
use crate::result::Result;
use anyhow::ensure;
use candle_core::{Device, Tensor};
use ndarray::{ArcArray, ArcArray1, Axis, Ix4};
use rand::{seq::SliceRandom, Rng};
use rayon::prelude::*;

/// MNIST / FashionMNIST.
#[cfg(feature = "mnist")]
pub mod mnist;

/// A set of images and their classes, stored on the host as bytes.
#[derive(Clone, Debug)]
pub struct ImageSet {
    images: ArcArray<u8, Ix4>,
    classes: ArcArray1<u8>,
}

impl ImageSet {
    /// Creates a set from `images` with shape \[n, channels, height, width\] and `classes` with shape \[n\].
    ///
    /// **Errors**
    /// - The number of images and classes differ.
    pub fn new(images: ArcArray<u8, Ix4>, classes: ArcArray1<u8>) -> Result<Self> {
        ensure!(
            images.len_of(Axis(0)) == classes.len(),
            "{} images but {} classes",
            images.len_of(Axis(0)),
            classes.len(),
        );
        Ok(Self { images, classes })
    }
    /// The images.
    pub fn images(&self) -> &ArcArray<u8, Ix4> {
        &self.images
    }
    /// The classes.
    pub fn classes(&self) -> &ArcArray1<u8> {
        &self.classes
    }
    /// The number of samples.
    pub fn len(&self) -> usize {
        self.classes.len()
    }
    /// Whether the set has no samples.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
    /// The shape of one image, (channels, height, width).
    pub fn image_dim(&self) -> (usize, usize, usize) {
        let (_, c, h, w) = self.images.dim();
        (c, h, w)
    }
    /// The number of batches yielded for `batch_size`, including a final partial batch.
    pub fn batch_count(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            0
        } else {
            (self.len() + batch_size - 1) / batch_size
        }
    }
    /// Iterates over the set in batches on `device`.
    ///
    /// Samples are visited in order unless `rng` is provided, in which case they are shuffled. The
    /// last batch may be smaller than `batch_size`.
    ///
    /// **Errors**
    /// - `batch_size` is 0.
    pub fn batches<R: Rng>(
        &self,
        device: &Device,
        batch_size: usize,
        rng: Option<&mut R>,
    ) -> Result<Batches<'_>> {
        ensure!(batch_size > 0, "batch_size must be greater than 0");
        let mut indices: Vec<usize> = (0..self.len()).collect();
        if let Some(rng) = rng {
            indices.shuffle(rng);
        }
        Ok(Batches {
            set: self,
            device: device.clone(),
            indices,
            batch_size,
            offset: 0,
        })
    }
    fn batch(&self, device: &Device, indices: &[usize]) -> Result<ImageBatch> {
        let (c, h, w) = self.image_dim();
        let images = self.images.select(Axis(0), indices);
        let bytes: Vec<u8> = images.iter().copied().collect();
        let pixels: Vec<f32> = bytes.par_iter().map(|x| f32::from(*x) / 255.).collect();
        let images = Tensor::from_vec(pixels, (indices.len(), c, h, w), device)?;
        let classes: Vec<u8> = indices.iter().map(|i| self.classes[*i]).collect();
        let classes = Tensor::from_vec(classes, indices.len(), device)?;
        Ok(ImageBatch { images, classes })
    }
}

/// A batch of images normalized to \[0, 1\].
#[derive(Clone, Debug)]
pub struct ImageBatch {
    /// Shape = \[batch_size, channels, height, width\], f32.
    pub images: Tensor,
    /// Shape = \[batch_size\], u8.
    pub classes: Tensor,
}

impl ImageBatch {
    /// The number of images in the batch.
    pub fn len(&self) -> usize {
        self.images.dims().first().copied().unwrap_or(0)
    }
    /// Whether the batch has no images.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Iterator over the batches of an [`ImageSet`].
///
/// See [`ImageSet::batches()`].
pub struct Batches<'a> {
    set: &'a ImageSet,
    device: Device,
    indices: Vec<usize>,
    batch_size: usize,
    offset: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<ImageBatch>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.indices.len() {
            return None;
        }
        let end = (self.offset + self.batch_size).min(self.indices.len());
        let indices = &self.indices[self.offset..end];
        self.offset = end;
        Some(self.set.batch(&self.device, indices))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.indices.len() - self.offset;
        let n = (remaining + self.batch_size - 1) / self.batch_size;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Batches<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;
    use rand::{rngs::StdRng, SeedableRng};

    fn image_set(n: usize) -> ImageSet {
        let images = Array::from_shape_fn([n, 1, 2, 2], |(i, _, y, x)| (i * 4 + y * 2 + x) as u8);
        let classes = Array::from_shape_fn(n, |i| (i % 10) as u8);
        ImageSet::new(images.into_shared(), classes.into_shared()).unwrap()
    }

    #[test]
    fn mismatched_classes() {
        let images = Array::<u8, _>::zeros([3, 1, 2, 2]).into_shared();
        let classes = Array::<u8, _>::zeros(2).into_shared();
        assert!(ImageSet::new(images, classes).is_err());
    }

    #[test]
    fn batches_in_order() -> Result<()> {
        let set = image_set(10);
        let batches: Vec<_> = set
            .batches::<StdRng>(&Device::Cpu, 4, None)?
            .collect::<Result<_>>()?;
        assert_eq!(batches.len(), set.batch_count(4));
        let sizes: Vec<usize> = batches.iter().map(ImageBatch::len).collect();
        assert_eq!(sizes, [4, 4, 2]);
        let classes = batches[1].classes.to_vec1::<u8>()?;
        assert_eq!(classes, [4, 5, 6, 7]);
        Ok(())
    }

    #[test]
    fn batches_normalized() -> Result<()> {
        let images = Array::from_elem([2, 1, 2, 2], 255u8).into_shared();
        let classes = Array::<u8, _>::zeros(2).into_shared();
        let set = ImageSet::new(images, classes)?;
        let batch = set
            .batches::<StdRng>(&Device::Cpu, 2, None)?
            .next()
            .unwrap()?;
        assert_eq!(batch.images.dims(), [2, 1, 2, 2]);
        let pixels = batch.images.flatten_all()?.to_vec1::<f32>()?;
        assert!(pixels.iter().all(|x| *x == 1.));
        Ok(())
    }

    #[test]
    fn batches_shuffled() -> Result<()> {
        let set = image_set(64);
        let mut rng = StdRng::seed_from_u64(0);
        let mut classes = Vec::new();
        for batch in set.batches(&Device::Cpu, 10, Some(&mut rng))? {
            classes.extend(batch?.classes.to_vec1::<u8>()?);
        }
        let ordered: Vec<u8> = set.classes().iter().copied().collect();
        assert_ne!(classes, ordered);
        classes.sort_unstable();
        let mut expected = ordered;
        expected.sort_unstable();
        assert_eq!(classes, expected);
        Ok(())
    }

    #[test]
    fn zero_batch_size() {
        let set = image_set(2);
        assert!(set.batches::<StdRng>(&Device::Cpu, 0, None).is_err());
    }
}
