use std::{
    fs::{self, OpenOptions},
    io::Write,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use log::{info, warn};
use machine_learning::{
    MlErr,
    dataset::LabeledDataset,
    optimization::{Adam, Optimizer, StepLr},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    builder::{BoxedTrainer, TrainerBuilder},
    checkpoint::{self, Checkpoint},
    configs::{DatasetConfig, ExperimentConfig},
    data,
    error::{Result, SessionErr},
    evaluation::{self, Metrics},
};

pub const TRAIN_LOSS_FILE: &str = "train_loss.txt";
pub const EVAL_FILE: &str = "eval.txt";

/// What a finished `Session::run` went through.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// The average training loss of every epoch run, in order.
    pub losses: Vec<f32>,
    /// The metrics of the last evaluation, if any happened.
    pub last_eval: Option<Metrics>,
}

/// A training run over the pooled training domains, evaluated on the held-out domain.
pub struct Session {
    config: ExperimentConfig,
    trainer: BoxedTrainer,
    train: LabeledDataset,
    test: LabeledDataset,
    scheduler: StepLr,
    rng: StdRng,
    start_epoch: usize,
    epochs: usize,
}

impl Session {
    /// Creates a new `Session`: loads the domains, builds the trainer and, if the config names
    /// a checkpoint, restores it.
    ///
    /// # Arguments
    /// * `config` - The description of the run.
    ///
    /// # Returns
    /// A new `Session` ready to `run`, or the first error found.
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let domains = data::load(&config.dataset, &mut rng)?;
        let (train, test) = data::split(domains, &config.train_domains, &config.test_domain)?;

        let num_classes = match &config.dataset {
            DatasetConfig::Synthetic { num_classes, .. } => *num_classes,
            DatasetConfig::Local { .. } => data::num_classes([&train, &test]),
        };
        if num_classes < 2 {
            return Err(SessionErr::InvalidDataset(format!(
                "at least 2 classes are required, found {num_classes}"
            )));
        }

        let input_dim = NonZeroUsize::new(train.width())
            .ok_or_else(|| SessionErr::InvalidDataset("images have no values".into()))?;
        let mut trainer =
            TrainerBuilder::new(&config).build(input_dim, num_classes, rng.random())?;

        let start_epoch = match &config.resume_from {
            Some(path) => {
                let checkpoint: Checkpoint<Adam> = Checkpoint::load(path)?;
                let epoch = checkpoint.restore(trainer.network_mut())?;
                info!("resumed from {} at epoch {epoch}", path.display());
                epoch + 1
            }
            None => 0,
        };

        let steps_per_epoch = (train.len() / config.batch_size.get()).max(1);
        let epochs = (config.iterations / steps_per_epoch).max(1);
        let scheduler = StepLr::new(config.scheduler.step_size, config.scheduler.gamma)?;

        fs::create_dir_all(&config.output_dir)?;

        info!(
            train_examples = train.len(),
            test_examples = test.len(),
            num_classes = num_classes,
            epochs = epochs;
            "session ready"
        );

        Ok(Self {
            config,
            trainer,
            train,
            test,
            scheduler,
            rng,
            start_epoch,
            epochs,
        })
    }

    /// The epoch the next `run` starts at.
    pub fn start_epoch(&self) -> usize {
        self.start_epoch
    }

    /// The epoch `run` stops before.
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn trainer(&self) -> &BoxedTrainer {
        &self.trainer
    }

    /// Trains until the last epoch, logging the loss and checkpointing after every epoch and
    /// evaluating on the held-out domain every `eval_every` epochs.
    pub fn run(&mut self) -> Result<Summary> {
        let mut summary = Summary {
            losses: Vec::new(),
            last_eval: None,
        };

        for epoch in self.start_epoch..self.epochs {
            let learning_rate = self
                .scheduler
                .learning_rate(self.config.hparams.learning_rate, epoch);
            self.trainer
                .network_mut()
                .optimizer_mut()
                .set_learning_rate(learning_rate);

            let loss = self.train_epoch()?;
            append(&self.output(TRAIN_LOSS_FILE), &format!("{loss}\n"))?;
            info!(epoch = epoch, loss = loss, learning_rate = learning_rate; "epoch finished");

            let path = self.output(&checkpoint::file_name(epoch, &self.config.test_domain));
            Checkpoint::capture(epoch, self.trainer.network()).save(&path)?;
            info!("saved checkpoint {}", path.display());

            if epoch % self.config.eval_every.get() == 0 {
                let metrics = self.evaluate()?;
                append(&self.output(EVAL_FILE), &format!("{epoch}, {metrics}\n"))?;
                info!(
                    epoch = epoch,
                    accuracy = metrics.accuracy,
                    precision = metrics.precision,
                    recall = metrics.recall;
                    "evaluated on {}", self.config.test_domain
                );
                summary.last_eval = Some(metrics);
            }

            summary.losses.push(loss);
        }

        self.start_epoch = self.epochs;
        Ok(summary)
    }

    /// Evaluates the trainer on the held-out domain.
    pub fn evaluate(&self) -> Result<Metrics> {
        evaluation::evaluate(&*self.trainer, &self.test, self.config.batch_size)
    }

    /// Runs one pass over the shuffled training set.
    ///
    /// # Returns
    /// The average loss of the batches trained on.
    fn train_epoch(&mut self) -> Result<f32> {
        self.train.shuffle(&mut self.rng);

        let mut total = 0.;
        let mut count = 0;

        for batch in self.train.batches(self.config.batch_size) {
            match self.trainer.update(&batch) {
                Ok(loss) => {
                    total += loss;
                    count += 1;
                }
                Err(MlErr::DegenerateBatch { got, min }) => {
                    warn!("skipping a batch of {got} example(s), at least {min} are required");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if count == 0 {
            return Err(SessionErr::InvalidDataset(
                "no batch of the training set could be trained on".into(),
            ));
        }

        Ok(total / count as f32)
    }

    fn output(&self, file: &str) -> PathBuf {
        self.config.output_dir.join(file)
    }
}

fn append(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())?;
    Ok(())
}
