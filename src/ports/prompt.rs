use color_eyre::eyre::Result;

/// Interactive questions asked from the coordinating task.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Prompter: Send + Sync {
    async fn confirm(&self, message: &str) -> Result<bool>;

    /// `Ok(None)` when the user leaves the answer empty.
    async fn input(&self, message: &str) -> Result<Option<String>>;
}
