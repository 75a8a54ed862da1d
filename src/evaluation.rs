use std::{fmt, num::NonZeroUsize};

use machine_learning::{arch::ops, dataset::LabeledDataset, training::Trainer};

use crate::error::Result;

/// Classification metrics on a held-out domain, precision and recall are macro averaged over
/// the classes that appear either in the labels or in the predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
}

impl Metrics {
    /// Computes the metrics of a set of predictions.
    ///
    /// # Arguments
    /// * `predictions` - The predicted class of every example.
    /// * `labels` - The true class of every example.
    /// * `num_classes` - The amount of classes.
    pub fn from_predictions(predictions: &[usize], labels: &[usize], num_classes: usize) -> Self {
        let mut true_pos = vec![0usize; num_classes];
        let mut predicted = vec![0usize; num_classes];
        let mut actual = vec![0usize; num_classes];

        for (&pred, &label) in predictions.iter().zip(labels) {
            if pred < num_classes {
                predicted[pred] += 1;
            }
            if label < num_classes {
                actual[label] += 1;
            }
            if pred == label && pred < num_classes {
                true_pos[pred] += 1;
            }
        }

        let hits: usize = true_pos.iter().sum();
        let total = predictions.len().min(labels.len());

        let classes: Vec<_> = (0..num_classes)
            .filter(|&c| predicted[c] + actual[c] > 0)
            .collect();

        let ratio = |num: usize, den: usize| if den == 0 { 0. } else { num as f32 / den as f32 };
        let macro_avg = |den: &[usize]| {
            if classes.is_empty() {
                return 0.;
            }
            let sum: f32 = classes.iter().map(|&c| ratio(true_pos[c], den[c])).sum();
            sum / classes.len() as f32
        };

        Self {
            accuracy: ratio(hits, total),
            precision: macro_avg(&predicted),
            recall: macro_avg(&actual),
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.accuracy, self.precision, self.recall)
    }
}

/// Evaluates a trainer on a dataset, predicting it `batch_size` examples at a time.
pub fn evaluate<T: Trainer + ?Sized>(
    trainer: &T,
    dataset: &LabeledDataset,
    batch_size: NonZeroUsize,
) -> Result<Metrics> {
    let mut predictions = Vec::with_capacity(dataset.len());

    for batch in dataset.batches(batch_size) {
        let logits = trainer.predict(batch.images())?;
        predictions.extend(ops::argmax(logits.view()));
    }

    Ok(Metrics::from_predictions(
        &predictions,
        dataset.labels(),
        trainer.network().num_classes(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_predictions() {
        let metrics = Metrics::from_predictions(&[0, 1, 2, 1], &[0, 1, 2, 1], 3);

        assert_eq!(
            metrics,
            Metrics {
                accuracy: 1.,
                precision: 1.,
                recall: 1.
            }
        );
    }

    #[test]
    fn macro_averages() {
        // class 0: tp 1, predicted 2, actual 1
        // class 1: tp 1, predicted 1, actual 2
        let metrics = Metrics::from_predictions(&[0, 0, 1], &[0, 1, 1], 2);

        assert!((metrics.accuracy - 2. / 3.).abs() < 1e-6);
        assert!((metrics.precision - (0.5 + 1.) / 2.).abs() < 1e-6);
        assert!((metrics.recall - (1. + 0.5) / 2.).abs() < 1e-6);
    }

    #[test]
    fn absent_classes_are_ignored() {
        let metrics = Metrics::from_predictions(&[1, 1], &[1, 1], 5);

        assert_eq!(metrics.precision, 1.);
        assert_eq!(metrics.recall, 1.);
    }

    #[test]
    fn empty_predictions() {
        let metrics = Metrics::from_predictions(&[], &[], 3);

        assert_eq!(metrics.accuracy, 0.);
        assert_eq!(metrics.precision, 0.);
    }

    #[test]
    fn display_is_comma_separated() {
        let metrics = Metrics {
            accuracy: 0.5,
            precision: 0.25,
            recall: 1.,
        };

        assert_eq!(metrics.to_string(), "0.5, 0.25, 1");
    }
}
