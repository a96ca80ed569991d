use super::plan::ReadinessCheck;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "kubeseq.toml";

// =============================================================================
// Cluster Control Tool
// =============================================================================

/// How the cluster control tool is invoked
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KubectlConfig {
    /// Executable name or path
    #[serde(default = "default_kubectl_command")]
    pub command: String,

    /// Arguments placed before the manifest path
    #[serde(default = "default_apply_args")]
    pub apply_args: Vec<String>,

    /// Optional `--context` value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Optional `--namespace` value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Per-file timeout in seconds (0 = no timeout)
    #[serde(default)]
    pub apply_timeout_secs: u64,
}

fn default_kubectl_command() -> String {
    "kubectl".to_string()
}

fn default_apply_args() -> Vec<String> {
    vec!["apply".to_string(), "-f".to_string()]
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            command: default_kubectl_command(),
            apply_args: default_apply_args(),
            context: None,
            namespace: None,
            apply_timeout_secs: 0,
        }
    }
}

impl KubectlConfig {
    pub fn apply_timeout(&self) -> Option<Duration> {
        (self.apply_timeout_secs > 0).then(|| Duration::from_secs(self.apply_timeout_secs))
    }
}

// =============================================================================
// Phases
// =============================================================================

/// An explicitly ordered phase as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseConfig {
    pub name: String,

    /// Manifest paths, relative to the manifest directory unless absolute
    pub files: Vec<PathBuf>,

    /// Fixed stabilization pause after the phase
    #[serde(default)]
    pub post_delay_secs: u64,

    /// Readiness check that replaces the fixed pause when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessCheck>,
}

impl PhaseConfig {
    pub fn new<I, P>(name: impl Into<String>, files: I, post_delay_secs: u64) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            files: files.into_iter().map(Into::into).collect(),
            post_delay_secs,
            readiness: None,
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessCheck) -> Self {
        self.readiness = Some(readiness);
        self
    }
}

/// Database, then message broker, then ingress.
fn default_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new(
            "PostgreSQL",
            [
                "postgres-configmap.yaml",
                "postgres-secret.yaml",
                "postgres-pv.yaml",
                "postgres-pvc.yaml",
                "postgres-service.yaml",
                "postgres-statefulset.yaml",
            ],
            10,
        ),
        PhaseConfig::new("RabbitMQ", ["rabbitmq-delp.yaml"], 5),
        PhaseConfig::new("Ingress", ["ingress-nginx.yaml"], 5),
    ]
}

// =============================================================================
// Sequencer Configuration
// =============================================================================

/// Top-level configuration, built once at start-up
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SequencerConfig {
    /// Directory holding the manifests
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// File extensions treated as manifests (without the dot)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Name of the implicit phase holding unclaimed manifests
    #[serde(default = "default_remainder_phase")]
    pub remainder_phase: String,

    #[serde(default)]
    pub kubectl: KubectlConfig,

    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseConfig>,
}

fn default_directory() -> PathBuf {
    PathBuf::from("K8S")
}

fn default_extensions() -> Vec<String> {
    vec!["yaml".to_string()]
}

fn default_remainder_phase() -> String {
    "Other Services".to_string()
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extensions: default_extensions(),
            remainder_phase: default_remainder_phase(),
            kubectl: KubectlConfig::default(),
            phases: default_phases(),
        }
    }
}

impl SequencerConfig {
    /// Load config from a TOML file, falling back to defaults if it is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: SequencerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config as TOML
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Whether a path has one of the configured manifest extensions
    pub fn is_manifest(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| self.extensions.iter().any(|e| e == ext))
    }
}
