use std::{collections::BTreeMap, fs, path::Path};

use log::info;
use machine_learning::dataset::LabeledDataset;
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    configs::DatasetConfig,
    error::{Result, SessionErr},
};

/// Every domain of a dataset, by name.
pub type Domains = BTreeMap<String, LabeledDataset>;

/// The on-disk representation of a domain: one row per image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub images: Vec<Vec<f32>>,
    pub labels: Vec<usize>,
}

impl DomainRecord {
    fn into_dataset(self, name: &str) -> Result<LabeledDataset> {
        let width = self.images.first().map_or(0, Vec::len);

        if width == 0 {
            return Err(SessionErr::InvalidDataset(format!(
                "domain {name:?} has no examples"
            )));
        }

        if let Some(i) = self.images.iter().position(|row| row.len() != width) {
            return Err(SessionErr::InvalidDataset(format!(
                "domain {name:?}: image {i} has {} values, expected {width}",
                self.images[i].len()
            )));
        }

        let rows = self.images.len();
        let flat = self.images.into_iter().flatten().collect();
        let images = Array2::from_shape_vec((rows, width), flat)
            .map_err(|e| SessionErr::InvalidDataset(format!("domain {name:?}: {e}")))?;

        Ok(LabeledDataset::new(images, self.labels)?)
    }
}

/// Loads or synthesizes every domain described by `config`.
///
/// # Arguments
/// * `config` - The dataset's source.
/// * `rng` - The random number generator used to synthesize data.
pub fn load<R: Rng>(config: &DatasetConfig, rng: &mut R) -> Result<Domains> {
    match config {
        DatasetConfig::Synthetic {
            num_classes,
            input_dim,
            samples_per_domain,
            domains,
            domain_shift,
        } => synthesize(
            *num_classes,
            *input_dim,
            *samples_per_domain,
            domains,
            *domain_shift,
            rng,
        ),
        DatasetConfig::Local { path } => read_local(path),
    }
}

/// Reads a JSON file mapping domain names to `DomainRecord`s.
pub fn read_local<P: AsRef<Path>>(path: P) -> Result<Domains> {
    let raw = fs::read_to_string(path.as_ref())?;
    let records: BTreeMap<String, DomainRecord> = serde_json::from_str(&raw)?;

    info!("read {} domain(s) from {}", records.len(), path.as_ref().display());

    records
        .into_iter()
        .map(|(name, record)| {
            let dataset = record.into_dataset(&name)?;
            Ok((name, dataset))
        })
        .collect()
}

/// Generates a multi-domain classification problem.
///
/// Every class has a gaussian prototype shared by all domains, each domain adds its own offset
/// (scaled by `domain_shift`) and contrast to every image, so a classifier that latches onto
/// domain specific directions generalizes poorly to unseen domains.
///
/// # Arguments
/// * `num_classes` - The amount of classes, labels cycle through them.
/// * `input_dim` - The width of every image.
/// * `samples_per_domain` - The amount of images in each domain.
/// * `domains` - The names of the domains.
/// * `domain_shift` - How far apart the domains are.
/// * `rng` - The random number generator to sample from.
pub fn synthesize<R: Rng>(
    num_classes: usize,
    input_dim: usize,
    samples_per_domain: usize,
    domains: &[String],
    domain_shift: f32,
    rng: &mut R,
) -> Result<Domains> {
    let unit = Normal::new(0., 1.).map_err(|e| SessionErr::InvalidDataset(e.to_string()))?;
    let shift = Normal::new(0., domain_shift)
        .map_err(|e| SessionErr::InvalidDataset(e.to_string()))?;

    let prototypes = Array2::from_shape_fn((num_classes, input_dim), |_| 3. * unit.sample(rng));

    domains
        .iter()
        .map(|name| {
            let offset: Vec<f32> = (0..input_dim).map(|_| shift.sample(rng)).collect();
            let contrast = 1. + 0.5 * domain_shift * rng.random_range(-1.0f32..=1.0).abs();

            let labels: Vec<usize> = (0..samples_per_domain).map(|i| i % num_classes).collect();
            let images = Array2::from_shape_fn((samples_per_domain, input_dim), |(i, j)| {
                contrast * (prototypes[[labels[i], j]] + unit.sample(rng)) + offset[j]
            });

            Ok((name.clone(), LabeledDataset::new(images, labels)?))
        })
        .collect()
}

/// Splits the domains into the pooled training set and the held-out test set.
///
/// # Returns
/// `(train, test)` or an error if a domain is missing or the widths don't agree.
pub fn split(
    mut domains: Domains,
    train: &[String],
    test: &str,
) -> Result<(LabeledDataset, LabeledDataset)> {
    let mut take = |name: &str| {
        domains
            .remove(name)
            .ok_or_else(|| SessionErr::InvalidDataset(format!("unknown domain {name:?}")))
    };

    let test = take(test)?;
    let train = train
        .iter()
        .map(|name| take(name))
        .collect::<Result<Vec<_>>>()?;

    let train = LabeledDataset::concat(train)?;
    if train.width() != test.width() {
        return Err(SessionErr::InvalidDataset(format!(
            "training images have {} values, test images have {}",
            train.width(),
            test.width()
        )));
    }

    Ok((train, test))
}

/// Returns the amount of classes seen in the given datasets.
pub fn num_classes<'a, I>(datasets: I) -> usize
where
    I: IntoIterator<Item = &'a LabeledDataset>,
{
    datasets
        .into_iter()
        .flat_map(|ds| ds.labels().iter().copied())
        .max()
        .map_or(0, |max| max + 1)
}
