use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use ratings::Partition;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// `root/<modality>/<method>/<image>`
    pub image_root: PathBuf,
    /// Where rating datasets are written.
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub partition: Partition,
    /// Also accept `.bmp` and `.tiff` images.
    pub extra_formats: bool,
    /// Sessions untouched for this long are dropped.
    pub session_idle: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let image_root = PathBuf::from(var_or("SURVEY_IMAGE_ROOT", "resultselect"));
        let data_dir = PathBuf::from(var_or("SURVEY_DATA_DIR", "data"));
        let bind_addr = var_or("SURVEY_BIND_ADDR", "0.0.0.0:8080");

        let partition = var_or("SURVEY_PARTITION", "per_rater")
            .parse::<Partition>()
            .map_err(|e| anyhow!(e))
            .context("SURVEY_PARTITION must be per_rater, shared or shared_by_item")?;

        let extra_formats = std::env::var("SURVEY_EXTRA_FORMATS")
            .ok()
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
            .unwrap_or(false);

        let idle_secs = var_or("SURVEY_SESSION_IDLE_SECS", "3600");
        let session_idle = match idle_secs.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => bail!("SURVEY_SESSION_IDLE_SECS must be a positive number of seconds, got {idle_secs}"),
        };

        if bind_addr.parse::<std::net::SocketAddr>().is_err() {
            bail!("SURVEY_BIND_ADDR must be host:port, got {bind_addr}");
        }
        if data_dir.as_os_str().is_empty() {
            bail!("SURVEY_DATA_DIR must not be empty");
        }

        Ok(Self { image_root, data_dir, bind_addr, partition, extra_formats, session_idle })
    }

    /// Dataset file for one rater's ratings of `modality`.
    pub fn dataset_path(&self, modality: &str, rater_name: &str) -> PathBuf {
        self.data_dir.join(self.partition.dataset_file_name(modality, rater_name))
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
