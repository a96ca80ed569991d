use crate::models::{SequencerConfig, CONFIG_FILE};
use crate::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Write the default config file
pub fn run(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

    if path.exists() && !force {
        println!(
            "{}",
            format!("⚠️  {} already exists", path.display()).yellow()
        );
        println!("   Run with --force to overwrite");
        return Ok(());
    }

    SequencerConfig::default().save(&path)?;

    println!("{}", format!("✅ Wrote {}", path.display()).green());
    println!();
    println!("Next steps:");
    println!("   1. Point `directory` at your manifest folder");
    println!("   2. Adjust the phases and waits");
    println!("   3. Run: kubeseq plan");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_default_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);

        run(Some(&path), false).unwrap();
        let loaded = SequencerConfig::load(&path).unwrap();
        assert_eq!(loaded, SequencerConfig::default());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(&path, "directory = \"mine\"\n").unwrap();

        run(Some(&path), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "directory = \"mine\"\n");

        run(Some(&path), true).unwrap();
        let loaded = SequencerConfig::load(&path).unwrap();
        assert_eq!(loaded.directory, PathBuf::from("K8S"));
    }
}
