use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// A borrowed batch of labeled examples: one image per row of `images` and one class id per
/// entry of `labels`.
///
/// The batch is not validated on construction, trainers check it against their model.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    images: ArrayView2<'a, f32>,
    labels: &'a [usize],
}

impl<'a> Batch<'a> {
    pub fn new(images: ArrayView2<'a, f32>, labels: &'a [usize]) -> Self {
        Self { images, labels }
    }

    pub fn images(&self) -> ArrayView2<'a, f32> {
        self.images
    }

    pub fn labels(&self) -> &'a [usize] {
        self.labels
    }

    /// Returns the amount of examples in the batch.
    #[inline]
    pub fn len(&self) -> usize {
        self.images.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.nrows() == 0
    }
}

/// An in-memory labeled dataset: one flattened image per row.
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    images: Array2<f32>,
    labels: Vec<usize>,
}

impl LabeledDataset {
    /// Creates a new `LabeledDataset`.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if there isn't exactly one label per image.
    pub fn new(images: Array2<f32>, labels: Vec<usize>) -> Result<Self> {
        if images.nrows() != labels.len() {
            return Err(MlErr::ShapeMismatch {
                what: "labels",
                got: labels.len(),
                expected: images.nrows(),
            });
        }

        Ok(Self { images, labels })
    }

    /// Concatenates several datasets with the same image width.
    pub fn concat<I>(datasets: I) -> Result<Self>
    where
        I: IntoIterator<Item = LabeledDataset>,
    {
        let datasets: Vec<_> = datasets.into_iter().collect();
        let width = datasets.first().map_or(0, |ds| ds.width());

        if let Some(ds) = datasets.iter().find(|ds| ds.width() != width) {
            return Err(MlErr::ShapeMismatch {
                what: "image width",
                got: ds.width(),
                expected: width,
            });
        }

        let views: Vec<_> = datasets.iter().map(|ds| ds.images.view()).collect();
        let images = ndarray::concatenate(Axis(0), &views).map_err(|_| MlErr::ShapeMismatch {
            what: "image width",
            got: 0,
            expected: width,
        })?;
        let labels = datasets.iter().flat_map(|ds| ds.labels.iter().copied()).collect();

        Self::new(images, labels)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the width of every image row.
    pub fn width(&self) -> usize {
        self.images.ncols()
    }

    pub fn images(&self) -> ArrayView2<'_, f32> {
        self.images.view()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Shuffles the examples in place, keeping each image with its label.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.images = self.images.select(Axis(0), &order);
        self.labels = order.iter().map(|&i| self.labels[i]).collect();
    }

    /// Splits the dataset in consecutive batches, the last one may be smaller.
    pub fn batches(&self, batch_size: NonZeroUsize) -> impl Iterator<Item = Batch<'_>> {
        let batch_size = batch_size.get();

        (0..self.len()).step_by(batch_size).map(move |start| {
            let end = (start + batch_size).min(self.len());
            Batch::new(
                self.images.slice(s![start..end, ..]),
                &self.labels[start..end],
            )
        })
    }
}
