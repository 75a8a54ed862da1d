#![cfg(test)]

use std::num::NonZeroUsize;

use ndarray::Array2;
use rand::{SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Normal};

use crate::{
    arch::{builder, ops},
    dataset::LabeledDataset,
    optimization::Adam,
    training::{ErmTrainer, Network, RscTrainer, Trainer},
};

const INPUT_DIM: usize = 4;

/// Two well separated gaussian blobs, one per class.
fn blobs(n: usize, seed: u64) -> LabeledDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0., 0.5).unwrap();

    let labels: Vec<usize> = (0..n).map(|i| i % 2).collect();
    let images = Array2::from_shape_fn((n, INPUT_DIM), |(i, j)| {
        let center = if labels[i] == 0 { 2. } else { -2. };
        let sign = if j % 2 == 0 { 1. } else { -1. };
        sign * center + noise.sample(&mut rng)
    });

    LabeledDataset::new(images, labels).unwrap()
}

fn network(seed: u64) -> Network<Adam> {
    let featurizer = builder::featurizer(INPUT_DIM, &[8], 6);
    let classifier = builder::classifier(6, 2, false);
    let params = builder::init_params(&[&featurizer, &classifier], StdRng::seed_from_u64(seed))
        .unwrap();
    let optimizer = Adam::with_defaults(params.len(), 0.01, 0.);

    Network::new(featurizer, classifier, params, optimizer).unwrap()
}

fn accuracy<T: Trainer>(trainer: &T, dataset: &LabeledDataset) -> f32 {
    let logits = trainer.predict(dataset.images()).unwrap();
    let hits = ops::argmax(logits.view())
        .into_iter()
        .zip(dataset.labels())
        .filter(|(pred, label)| pred == *label)
        .count();

    hits as f32 / dataset.len() as f32
}

fn train<T: Trainer>(trainer: &mut T, dataset: &mut LabeledDataset, epochs: usize) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(0);
    let batch_size = NonZeroUsize::new(16).unwrap();
    let mut losses = Vec::new();

    for _ in 0..epochs {
        dataset.shuffle(&mut rng);

        let mut total = 0.;
        let mut count = 0;
        for batch in dataset.batches(batch_size) {
            total += trainer.update(&batch).unwrap();
            count += 1;
        }

        losses.push(total / count as f32);
    }

    losses
}

#[test]
fn test_erm_blobs_convergence() {
    let mut dataset = blobs(64, 1);
    let mut trainer = ErmTrainer::new(network(2));

    let losses = train(&mut trainer, &mut dataset, 30);

    assert!(losses[losses.len() - 1] < losses[0]);
    assert!(accuracy(&trainer, &blobs(32, 3)) > 0.9);
}

#[test]
fn test_rsc_blobs_convergence() {
    let mut dataset = blobs(64, 1);
    let mut trainer = RscTrainer::new(network(2), 1. / 3., 1. / 3.).unwrap();

    let losses = train(&mut trainer, &mut dataset, 60);

    assert!(losses.iter().all(|l| l.is_finite()));
    assert!(losses[losses.len() - 1] < losses[0]);
    assert!(accuracy(&trainer, &blobs(32, 3)) > 0.85);
}
