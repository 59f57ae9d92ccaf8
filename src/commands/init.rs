use crate::args::InitArgs;
use crate::commands::Out;
use crate::model::Divisions;
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;
use tracing::debug;

/// Creates the data directory, its `.secrets` subdirectory and an initial `config.json`, moving the
/// provided credential files and copying the division list into place.
///
/// # Arguments
/// - `home` - The directory that will be the root of the data directory, e.g. `$HOME/proms-sync`
/// - `args` - The sheet URL, the PROMS URL and the paths of the client secret, token and division
///   files. The division list is validated before anything is created.
///
/// # Errors
/// - Returns an error if the division list is unusable or if any file operation fails.
pub async fn init(home: &Path, args: &InitArgs) -> Result<Out<()>> {
    let divisions = Divisions::load(args.divisions())
        .await
        .context("The division list cannot be used")?;
    debug!("{} divisions found in {}", divisions.len(), args.divisions().display());

    let config = Config::create(home, args)
        .await
        .context("Unable to create the data directory and configs")?;
    Ok(format!(
        "Created {} with {} divisions",
        config.config_path().display(),
        divisions.len()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::init_args;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_home() {
        let dir = TempDir::new().unwrap();
        let args = init_args(dir.path());
        let home = dir.path().join("home");

        let out = init(&home, &args).await.unwrap();
        assert!(out.message().contains("2 divisions"), "{}", out.message());

        let config = Config::load(&home).await.unwrap();
        assert!(config.client_secret_path().is_file());
        assert!(config.token_path().is_file());
        assert!(config.divisions_path().is_file());
        assert!(!args.client_secret().exists());
        assert!(!args.token().exists());
        // The division list is copied, not moved.
        assert!(args.divisions().exists());
    }

    #[tokio::test]
    async fn test_init_rejects_bad_divisions() {
        let dir = TempDir::new().unwrap();
        let args = init_args(dir.path());
        std::fs::write(args.divisions(), "id,nama_divisi\n1,Finance\n1,Legal\n").unwrap();
        let home = dir.path().join("home");

        assert!(init(&home, &args).await.is_err());
        assert!(!home.exists());
        assert!(args.client_secret().exists());
    }
}
