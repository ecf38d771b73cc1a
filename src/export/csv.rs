use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;

/// Header of the per-episode reward table
pub const REWARD_HEADER: &str = "Reward";

/// Header of the per-episode mean-loss table
pub const LOSS_HEADER: &str = "average_loss";

/// Rewrite the reward table: one row per finished episode.
pub fn write_reward_history<P: AsRef<Path>>(path: P, rewards: &[f32]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut file = BufWriter::new(fs::File::create(path)?);

    writeln!(file, "{}", REWARD_HEADER)?;
    for reward in rewards {
        writeln!(file, "{}", reward)?;
    }
    file.flush()?;
    Ok(())
}

/// Append one episode's mean loss, writing the header first if the file is empty.
pub fn append_average_loss<P: AsRef<Path>>(path: P, average_loss: f32) -> Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    if file.metadata()?.len() == 0 {
        writeln!(file, "{}", LOSS_HEADER)?;
    }
    writeln!(file, "{}", average_loss)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir)?;
            Ok(())
        }
        _ => Ok(()),
    }
}
