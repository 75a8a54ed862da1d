use std::{env, path::PathBuf};

use anyhow::{Context, bail};
use log::info;

use domain_generalization::{Session, configs::ExperimentConfig};

const CONFIG_VAR: &str = "DG_CONFIG";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = match env::args_os().nth(1) {
        Some(path) => PathBuf::from(path),
        None => match env::var_os(CONFIG_VAR) {
            Some(path) => PathBuf::from(path),
            None => bail!("usage: dg-train <config.json> (or set {CONFIG_VAR})"),
        },
    };

    let config = ExperimentConfig::from_file(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;

    info!(
        "training {:?} on {:?}, holding out {:?}",
        config.algorithm, config.train_domains, config.test_domain
    );

    let mut session = Session::new(config).context("failed to start the session")?;
    let summary = session.run().context("training failed")?;

    match summary.last_eval {
        Some(metrics) => info!("finished, last evaluation (accuracy, precision, recall): {metrics}"),
        None => info!("finished without evaluating"),
    }

    Ok(())
}
