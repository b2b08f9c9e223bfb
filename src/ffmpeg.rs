use std::path::{Path, PathBuf};

use color_eyre::Result;
use color_eyre::eyre::{Context, OptionExt, eyre};
use tokio::process::Command;

use crate::ports::loudness::LoudnessTool;

pub struct Ffmpeg {
    binary: String,
}

impl Ffmpeg {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }

    fn locate(&self) -> Result<PathBuf> {
        which::which(&self.binary).wrap_err_with(|| {
            format!(
                "{} not found in PATH. Please install ffmpeg and ensure it's available.",
                self.binary
            )
        })
    }
}

/// Peak volume reported by the `volumedetect` filter, e.g. `max_volume: -2.5 dB`.
pub fn parse_max_volume(stderr: &str) -> Option<f64> {
    stderr.lines().find_map(|line| {
        let (_, rest) = line.split_once("max_volume:")?;
        rest.trim().trim_end_matches("dB").trim().parse().ok()
    })
}

/// Scratch file next to `path`: `Song.mp3` → `Song.gain.mp3`.
fn scratch_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{stem}.gain.{ext}"))
}

#[async_trait::async_trait]
impl LoudnessTool for Ffmpeg {
    async fn measure(&self, path: &Path) -> Result<f64> {
        let output = Command::new(self.locate()?)
            .arg("-hide_banner")
            .arg("-i")
            .arg(path)
            .args(["-af", "volumedetect", "-vn", "-sn", "-dn", "-f", "null", "-"])
            .output()
            .await
            .wrap_err("Failed to run ffmpeg")?;

        if !output.status.success() {
            return Err(eyre!(
                "ffmpeg volumedetect failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        parse_max_volume(&String::from_utf8_lossy(&output.stderr))
            .ok_or_eyre("ffmpeg did not report max_volume")
    }

    async fn apply_gain(&self, delta_db: f64, path: &Path) -> Result<()> {
        let scratch = scratch_path(path);
        let output = Command::new(self.locate()?)
            .args(["-hide_banner", "-y", "-i"])
            .arg(path)
            .arg("-af")
            .arg(format!("volume={delta_db}dB"))
            .args(["-map_metadata", "0"])
            .arg(&scratch)
            .output()
            .await
            .wrap_err("Failed to run ffmpeg")?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&scratch).await;
            return Err(eyre!(
                "ffmpeg volume filter failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        tokio::fs::rename(&scratch, path)
            .await
            .wrap_err_with(|| format!("Failed to replace {}", path.display()))
    }
}
