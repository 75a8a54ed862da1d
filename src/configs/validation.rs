use std::collections::HashSet;

use super::{ActFnConfig, DatasetConfig, ExperimentConfig, Hyperparameters, ModelConfig, SchedulerConfig};
use crate::error::{Result, SessionErr};

impl ExperimentConfig {
    /// Checks the configuration before anything is loaded or trained.
    ///
    /// # Returns
    /// An `InvalidConfig` error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.validate_domains()?;
        validate_hparams(&self.hparams)?;
        validate_model(&self.model)?;
        validate_scheduler(&self.scheduler)?;

        if self.iterations == 0 {
            return Err(invalid("iterations must be greater than 0"));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Domains
    // -------------------------------------------------------------------------

    fn validate_domains(&self) -> Result<()> {
        if self.train_domains.is_empty() {
            return Err(invalid("at least one training domain is required"));
        }

        let mut seen = HashSet::new();
        for domain in &self.train_domains {
            if !seen.insert(domain) {
                return Err(invalid(format!("training domain {domain:?} is repeated")));
            }
        }

        if seen.contains(&self.test_domain) {
            return Err(invalid(format!(
                "test domain {:?} is also a training domain",
                self.test_domain
            )));
        }

        if let DatasetConfig::Synthetic {
            num_classes,
            input_dim,
            samples_per_domain,
            domains,
            domain_shift,
        } = &self.dataset
        {
            if *num_classes < 2 {
                return Err(invalid("a synthetic dataset needs at least 2 classes"));
            }
            if *input_dim == 0 {
                return Err(invalid("input_dim must be greater than 0"));
            }
            if *samples_per_domain == 0 {
                return Err(invalid("samples_per_domain must be greater than 0"));
            }
            if !(domain_shift.is_finite() && *domain_shift >= 0.) {
                return Err(invalid(format!(
                    "domain_shift must be a non negative number, got {domain_shift}"
                )));
            }

            let used = self.train_domains.iter().chain([&self.test_domain]);
            for domain in used {
                if !domains.contains(domain) {
                    return Err(invalid(format!(
                        "domain {domain:?} is not one of the synthetic domains {domains:?}"
                    )));
                }
            }
        }

        Ok(())
    }
}

// -------------------------------------------------------------------------
// Model & optimization
// -------------------------------------------------------------------------

fn validate_hparams(hparams: &Hyperparameters) -> Result<()> {
    if !(hparams.learning_rate.is_finite() && hparams.learning_rate > 0.) {
        return Err(invalid(format!(
            "learning_rate must be positive, got {}",
            hparams.learning_rate
        )));
    }

    if !(hparams.weight_decay.is_finite() && hparams.weight_decay >= 0.) {
        return Err(invalid(format!(
            "weight_decay must be non negative, got {}",
            hparams.weight_decay
        )));
    }

    for (name, factor) in [
        ("rsc_f_drop_factor", hparams.rsc_f_drop_factor),
        ("rsc_b_drop_factor", hparams.rsc_b_drop_factor),
    ] {
        if !(factor > 0. && factor < 1.) {
            return Err(invalid(format!("{name} must be in (0, 1), got {factor}")));
        }
    }

    Ok(())
}

fn validate_model(model: &ModelConfig) -> Result<()> {
    if model.feature_dim == 0 {
        return Err(invalid("feature_dim must be greater than 0"));
    }

    if let Some(i) = model.featurizer_hidden.iter().position(|&w| w == 0) {
        return Err(invalid(format!(
            "featurizer hidden layer {i} must have at least one unit"
        )));
    }

    match model.act_fn {
        ActFnConfig::Sigmoid { amp } if !(amp.is_finite() && amp > 0.) => {
            return Err(invalid(format!(
                "sigmoid amp must be finite and greater than 0, got {amp}"
            )));
        }
        _ => {}
    }

    Ok(())
}

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<()> {
    if scheduler.step_size == 0 {
        return Err(invalid("scheduler step_size must be greater than 0"));
    }

    if !(scheduler.gamma.is_finite() && scheduler.gamma > 0.) {
        return Err(invalid(format!(
            "scheduler gamma must be positive, got {}",
            scheduler.gamma
        )));
    }

    Ok(())
}

fn invalid<S: Into<String>>(msg: S) -> SessionErr {
    SessionErr::InvalidConfig(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configs::{AlgorithmConfig, ParamGenConfig};

    fn config() -> ExperimentConfig {
        serde_json::from_str(
            r#"{
                "algorithm": "rsc",
                "model": { "featurizer_hidden": [16], "feature_dim": 8 },
                "dataset": {
                    "synthetic": {
                        "num_classes": 3,
                        "input_dim": 4,
                        "samples_per_domain": 30,
                        "domains": ["a", "b", "c"]
                    }
                },
                "train_domains": ["a", "b"],
                "test_domain": "c",
                "batch_size": 8,
                "iterations": 100,
                "output_dir": "out"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_are_filled_in() {
        let config = config();

        assert!(config.validate().is_ok());
        assert_eq!(config.algorithm, AlgorithmConfig::Rsc);
        assert_eq!(config.hparams, Hyperparameters::default());
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.eval_every.get(), 10);
        assert_eq!(config.resume_from, None);
        assert_eq!(config.model.act_fn, ActFnConfig::Relu);
        assert_eq!(config.model.init, ParamGenConfig::Kaiming);
        assert!(matches!(
            config.dataset,
            DatasetConfig::Synthetic { domain_shift, .. } if domain_shift == 1.
        ));
    }

    #[test]
    fn test_domain_must_be_held_out() {
        let mut config = config();
        config.test_domain = "a".into();

        assert!(matches!(config.validate(), Err(SessionErr::InvalidConfig(_))));
    }

    #[test]
    fn domains_must_exist() {
        let mut config = config();
        config.train_domains.push("z".into());

        assert!(matches!(config.validate(), Err(SessionErr::InvalidConfig(_))));
    }

    #[test]
    fn repeated_domains_are_rejected() {
        let mut config = config();
        config.train_domains.push("a".into());

        assert!(matches!(config.validate(), Err(SessionErr::InvalidConfig(_))));
    }

    #[test]
    fn bad_hyperparameters_are_rejected() {
        let mut bad_factor = config();
        bad_factor.hparams.rsc_b_drop_factor = 1.;
        let mut bad_lr = config();
        bad_lr.hparams.learning_rate = 0.;
        let mut bad_width = config();
        bad_width.model.featurizer_hidden = vec![4, 0];
        let mut bad_gamma = config();
        bad_gamma.scheduler.gamma = f32::NAN;
        let mut bad_amp = config();
        bad_amp.model.act_fn = ActFnConfig::Sigmoid { amp: 0. };

        for config in [bad_factor, bad_lr, bad_width, bad_gamma, bad_amp] {
            assert!(matches!(config.validate(), Err(SessionErr::InvalidConfig(_))));
        }
    }

    #[test]
    fn model_choices_are_parsed() {
        let model: ModelConfig = serde_json::from_str(
            r#"{
                "feature_dim": 4,
                "act_fn": { "sigmoid": { "amp": 2.0 } },
                "init": "xavier_uniform"
            }"#,
        )
        .unwrap();

        assert_eq!(model.act_fn, ActFnConfig::Sigmoid { amp: 2. });
        assert_eq!(model.init, ParamGenConfig::XavierUniform);
        assert!(validate_model(&model).is_ok());
    }

    #[test]
    fn the_demo_mutes_a_third_of_the_batch_and_channels() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/rsc_synthetic.json");
        let config = ExperimentConfig::from_file(path).unwrap();

        for factor in [config.hparams.rsc_f_drop_factor, config.hparams.rsc_b_drop_factor] {
            let muted = 100. * (1. - factor);
            assert!((muted - 33.).abs() < 0.01, "{muted}% muted");
        }
    }
}
