use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use machine_learning::{optimization::Optimizer, training::Network};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Everything needed to continue a training run: the last finished epoch, the parameters and
/// the whole optimizer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint<O> {
    pub epoch: usize,
    pub params: Vec<f32>,
    pub optimizer: O,
}

/// Returns the file name of the checkpoint taken after `epoch` while holding out `test_domain`.
pub fn file_name(epoch: usize, test_domain: &str) -> String {
    format!("checkpoint_{epoch}_test_on_{test_domain}.json")
}

impl<O: Optimizer + Clone> Checkpoint<O> {
    /// Copies the state of `network` after `epoch`.
    pub fn capture(epoch: usize, network: &Network<O>) -> Self {
        Self {
            epoch,
            params: network.params().to_vec(),
            optimizer: network.optimizer().clone(),
        }
    }

    /// Moves this checkpoint's state into `network`.
    ///
    /// # Returns
    /// The epoch the checkpoint was taken at, or an error if it doesn't fit the network.
    pub fn restore(self, network: &mut Network<O>) -> Result<usize> {
        network.restore(self.params, self.optimizer)?;
        Ok(self.epoch)
    }
}

impl<O: Serialize> Checkpoint<O> {
    /// Writes this checkpoint to `path`.
    ///
    /// The checkpoint is written to a `.tmp` sibling first and renamed over `path` once
    /// complete, so a failed save leaves any previous checkpoint at `path` intact.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = tmp_path(path);

        if let Err(e) = self.write(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn write(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl<O: DeserializeOwned> Checkpoint<O> {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
