//! Version control helpers for commit message generation. Supports
//! git and jj working copies.
use anyhow::{Result, bail};
use tokio::process::Command;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Vcs {
    Git,
    Jj,
}

async fn run_command(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program).args(args).output().await?;
    if !output.status.success() {
        bail!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Returns the staged diff of the repository containing the current
/// working directory. For jj there is no staging area, so the diff of
/// the working-copy commit is used instead.
pub async fn staged_diff(vcs: Vcs) -> Result<String> {
    match vcs {
        Vcs::Git => {
            let root = run_command("git", &["rev-parse", "--show-toplevel"]).await?;
            run_command("git", &["-C", &root, "diff", "--staged"]).await
        }
        Vcs::Jj => {
            let root = run_command("jj", &["root"]).await?;
            run_command("jj", &["-R", &root, "diff", "--git"]).await
        }
    }
}
