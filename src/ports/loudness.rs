use std::path::Path;

use color_eyre::eyre::Result;

/// Port trait over the loudness measurement/adjustment tool.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LoudnessTool: Send + Sync {
    /// Peak volume of the file in dB, 0.0 being full scale.
    async fn measure(&self, path: &Path) -> Result<f64>;

    /// Apply `delta_db` of gain to the file in place.
    async fn apply_gain(&self, delta_db: f64, path: &Path) -> Result<()>;
}
