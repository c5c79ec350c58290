use anyhow::Result;

use crate::chat::FutagoBuilder;
use crate::chat::prompt::commit_prompt;
use crate::core::AppConfig;
use crate::core::vcs::{Vcs, staged_diff};

/// Generates a commit message from the staged diff with a one-shot
/// model call. No session, no persistence.
pub async fn run(config: &AppConfig, vcs: Vcs, custom_prompt: Option<&str>) -> Result<()> {
    let diff = staged_diff(vcs).await?;
    if diff.trim().is_empty() {
        println!("No staged changes.");
        return Ok(());
    }

    let futago = FutagoBuilder::new(&config.api_hostname, &config.api_key, &config.model).build()?;
    let message = futago.generate_content(&commit_prompt(custom_prompt, &diff)).await?;
    println!("{}", message);

    Ok(())
}
