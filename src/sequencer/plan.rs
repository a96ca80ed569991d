//! Plan construction: explicit phases from config plus the sorted remainder

use crate::models::{Phase, PhaseConfig, Plan, SequencerConfig, SequencerError, SequencerResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Build the plan described by `config`
pub fn build_plan(config: &SequencerConfig) -> SequencerResult<Plan> {
    build_plan_with(
        &config.directory,
        &config.phases,
        &config.remainder_phase,
        |path| config.is_manifest(path),
    )
}

/// Build a plan from a directory and explicitly ordered phases.
///
/// Every manifest in `directory` that no explicit phase claims is appended
/// as a final phase named `remainder_name`, sorted lexicographically.
/// No remainder phase is added when nothing is left over.
pub fn build_plan_with<F>(
    directory: &Path,
    explicit_phases: &[PhaseConfig],
    remainder_name: &str,
    is_manifest: F,
) -> SequencerResult<Plan>
where
    F: Fn(&Path) -> bool,
{
    if remainder_name.trim().is_empty() {
        return Err(SequencerError::config("The remainder phase name must not be empty"));
    }

    let manifests = scan_manifests(directory, is_manifest)?;

    // Keyed by canonical identity so `/abs/K8S/a.yaml` and `K8S/a.yaml` collide
    let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
    let mut phases = Vec::with_capacity(explicit_phases.len() + 1);

    for phase in explicit_phases {
        if phase.name.trim().is_empty() {
            return Err(SequencerError::config("Phase names must not be empty"));
        }
        if let Some(check) = &phase.readiness {
            if check.command.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(SequencerError::config(format!(
                    "Readiness check of phase '{}' has no command",
                    phase.name
                )));
            }
        }

        let mut files = Vec::with_capacity(phase.files.len());
        for file in &phase.files {
            let path = resolve(directory, file);
            if let Some(owner) = claimed.insert(identity(&path), phase.name.as_str()) {
                let message = if owner == phase.name {
                    format!("{} is listed more than once in phase '{}'", path.display(), owner)
                } else {
                    format!(
                        "{} is listed in both '{}' and '{}'",
                        path.display(),
                        owner,
                        phase.name
                    )
                };
                return Err(SequencerError::config(message));
            }
            if !path.is_file() {
                tracing::warn!(phase = %phase.name, file = %path.display(), "Listed manifest does not exist");
            }
            files.push(path);
        }

        phases.push(Phase::explicit(
            phase.name.clone(),
            files,
            phase.post_delay_secs,
            phase.readiness.clone(),
        ));
    }

    let mut remainder: Vec<PathBuf> = manifests
        .into_iter()
        .filter(|path| !claimed.contains_key(&identity(path)))
        .collect();
    remainder.sort();

    if !remainder.is_empty() {
        phases.push(Phase::remainder(remainder_name, remainder));
    }

    tracing::debug!(
        directory = %directory.display(),
        phases = phases.len(),
        "Built deployment plan"
    );

    Ok(Plan::new(directory, phases))
}

/// List manifest files directly inside `directory`, sorted
pub fn scan_manifests<F>(directory: &Path, is_manifest: F) -> SequencerResult<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let metadata = std::fs::metadata(directory).map_err(|e| {
        SequencerError::config(format!(
            "Manifest directory {} is not accessible: {}",
            directory.display(),
            e
        ))
    })?;
    if !metadata.is_dir() {
        return Err(SequencerError::config(format!(
            "{} is not a directory",
            directory.display()
        )));
    }

    let mut manifests = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            SequencerError::config(format!(
                "Failed to read manifest directory {}: {}",
                directory.display(),
                e
            ))
        })?;
        let path = entry.path();
        if path.is_file() && is_manifest(path) {
            manifests.push(path.to_path_buf());
        }
    }

    manifests.sort();
    Ok(manifests)
}

/// Canonical form of an existing path, the path itself otherwise
fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn resolve(directory: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        directory.join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PhaseKind, ReadinessCheck};
    use std::fs;
    use tempfile::TempDir;

    fn is_yaml(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == "yaml")
    }

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), "kind: ConfigMap\n").unwrap();
        }
    }

    fn names(phase: &Phase) -> Vec<String> {
        phase
            .files()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_remainder_is_unclaimed_and_sorted() {
        let temp = TempDir::new().unwrap();
        // Created out of order on purpose
        touch(temp.path(), &["d.yaml", "b.yaml", "c.yaml", "a.yaml"]);

        let phases = vec![
            PhaseConfig::new("first", ["a.yaml"], 10),
            PhaseConfig::new("second", ["b.yaml"], 5),
        ];
        let plan = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap();

        assert_eq!(plan.phases().len(), 3);
        let remainder = &plan.phases()[2];
        assert_eq!(remainder.name(), "rest");
        assert_eq!(remainder.kind(), PhaseKind::Remainder);
        assert_eq!(remainder.post_delay_secs(), 0);
        assert_eq!(names(remainder), vec!["c.yaml", "d.yaml"]);
    }

    #[test]
    fn test_only_top_level_manifests_are_scanned() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["api.yaml", "notes.txt", "api.yml", "README.md"]);
        fs::create_dir(temp.path().join("nested.yaml")).unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        touch(&temp.path().join("sub"), &["hidden.yaml"]);

        let files = scan_manifests(temp.path(), is_yaml).unwrap();
        assert_eq!(files, vec![temp.path().join("api.yaml")]);
    }

    #[test]
    fn test_empty_directory_yields_empty_plan() {
        let temp = TempDir::new().unwrap();
        let plan = build_plan_with(temp.path(), &[], "rest", is_yaml).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.file_count(), 0);
    }

    #[test]
    fn test_missing_directory_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = build_plan_with(&temp.path().join("nope"), &[], "rest", is_yaml).unwrap_err();
        assert!(matches!(err, SequencerError::Config(_)));
    }

    #[test]
    fn test_file_instead_of_directory_is_config_error() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["a.yaml"]);
        let err = build_plan_with(&temp.path().join("a.yaml"), &[], "rest", is_yaml).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_duplicate_claim_is_rejected() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["a.yaml"]);
        let phases = vec![
            PhaseConfig::new("first", ["a.yaml"], 0),
            PhaseConfig::new("second", ["a.yaml"], 0),
        ];
        let err = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap_err();
        assert!(err.to_string().contains("listed in both 'first' and 'second'"));

        let phases = vec![PhaseConfig::new("first", ["a.yaml", "a.yaml"], 0)];
        let err = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap_err();
        assert!(err.to_string().contains("listed more than once in phase 'first'"));
    }

    #[test]
    fn test_absolute_and_relative_spellings_are_one_manifest() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["a.yaml", "b.yaml"]);
        fs::create_dir(temp.path().join("sub")).unwrap();

        // Directory spelled through `..`, absolute listing
        let directory = temp.path().join("sub").join("..");
        let phases = vec![PhaseConfig::new("db", [temp.path().join("a.yaml")], 0)];
        let plan = build_plan_with(&directory, &phases, "rest", is_yaml).unwrap();
        assert_eq!(plan.file_count(), 2);
        assert_eq!(names(&plan.phases()[1]), vec!["b.yaml"]);

        // `..` inside a listed path
        let phases = vec![PhaseConfig::new("db", ["sub/../a.yaml"], 0)];
        let plan = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap();
        assert_eq!(plan.file_count(), 2);
        assert_eq!(names(&plan.phases()[1]), vec!["b.yaml"]);

        // Two spellings of the same file in different phases
        let phases = vec![
            PhaseConfig::new("db", ["a.yaml"], 0),
            PhaseConfig::new("again", ["sub/../a.yaml"], 0),
        ];
        let err = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap_err();
        assert!(matches!(err, SequencerError::Config(_)));
    }

    #[test]
    fn test_empty_readiness_command_is_config_error() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["db.yaml"]);

        for command in [Vec::<String>::new(), vec!["  ".to_string()]] {
            let phases = vec![PhaseConfig::new("db", ["db.yaml"], 0)
                .with_readiness(ReadinessCheck::new(command))];
            let err = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap_err();
            assert!(err.to_string().contains("Readiness check of phase 'db' has no command"));
        }
    }

    #[test]
    fn test_empty_remainder_name_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = build_plan_with(temp.path(), &[], " ", is_yaml).unwrap_err();
        assert!(matches!(err, SequencerError::Config(_)));
    }

    #[test]
    fn test_missing_explicit_file_is_kept_in_plan() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["z.yaml"]);
        let phases = vec![PhaseConfig::new("db", ["postgres.yaml"], 10)];

        let plan = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap();
        assert_eq!(names(&plan.phases()[0]), vec!["postgres.yaml"]);
        assert_eq!(names(&plan.phases()[1]), vec!["z.yaml"]);
    }

    #[test]
    fn test_explicit_phases_keep_given_order() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["pv.yaml", "configmap.yaml", "statefulset.yaml"]);
        let phases = vec![PhaseConfig::new(
            "db",
            ["statefulset.yaml", "configmap.yaml", "pv.yaml"],
            10,
        )];

        let plan = build_plan_with(temp.path(), &phases, "rest", is_yaml).unwrap();
        assert_eq!(plan.phases().len(), 1);
        assert_eq!(
            names(&plan.phases()[0]),
            vec!["statefulset.yaml", "configmap.yaml", "pv.yaml"]
        );
    }

    #[test]
    fn test_build_plan_uses_config_extensions() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), &["a.yaml", "b.yml"]);

        let mut config = SequencerConfig {
            directory: temp.path().to_path_buf(),
            phases: Vec::new(),
            ..SequencerConfig::default()
        };
        let plan = build_plan(&config).unwrap();
        assert_eq!(plan.file_count(), 1);

        config.extensions.push("yml".to_string());
        let plan = build_plan(&config).unwrap();
        assert_eq!(names(&plan.phases()[0]), vec!["a.yaml", "b.yml"]);
        assert_eq!(plan.phases()[0].name(), "Other Services");
    }
}
