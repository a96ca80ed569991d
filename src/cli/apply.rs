use super::console::{self, ConsoleSink};
use super::{ConfigArgs, OutputFormat};
use crate::models::RunReport;
use crate::sequencer::{build_plan, NullSink, Sequencer};
use crate::Result;
use anyhow::Context;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Summary format printed when the run ends
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Exit 0 even if some manifests failed to apply
    #[arg(long)]
    pub best_effort: bool,
}

/// Apply the whole plan and return the process exit code
pub async fn run(args: ApplyArgs) -> Result<i32> {
    let config = args.config.load()?;
    let plan = build_plan(&config).context("Cannot build deployment plan")?;

    let text = args.output == OutputFormat::Text;
    if text {
        println!(
            "{}",
            format!(
                "🚢 Deploying {} manifests from {}",
                plan.file_count(),
                plan.directory().display()
            )
            .cyan()
            .bold()
        );
    }

    let mut sequencer = Sequencer::from_config(&config);
    sequencer = if text {
        sequencer.with_sink(Arc::new(ConsoleSink::new()))
    } else {
        sequencer.with_sink(Arc::new(NullSink))
    };

    let cancel = sequencer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current manifest");
            cancel.cancel();
        }
    });

    let report = sequencer.run_plan(&plan).await;
    present(&report, args.output)?;

    Ok(report.exit_code(args.best_effort))
}

fn present(report: &RunReport, output: OutputFormat) -> Result<()> {
    match output.render(report)? {
        Some(rendered) => println!("{}", rendered),
        None => console::print_summary(report),
    }
    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::models::CONFIG_FILE;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Project with `sh` as the applier; any manifest named `*bad*` fails
    fn project(manifests: &[&str]) -> (TempDir, PathBuf) {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            r#"directory = "manifests"
phases = []

[kubectl]
command = "sh"
apply_args = ["-c", 'case "$1" in *bad*) echo "connection refused" >&2; exit 1;; esac', "sh"]
"#,
        )
        .unwrap();

        let dir = temp.path().join("manifests");
        fs::create_dir(&dir).unwrap();
        for name in manifests {
            fs::write(dir.join(name), "kind: Service\n").unwrap();
        }
        (temp, config_path)
    }

    fn args(config: PathBuf, directory: Option<PathBuf>, best_effort: bool) -> ApplyArgs {
        ApplyArgs {
            config: ConfigArgs { config, directory },
            output: OutputFormat::Json,
            best_effort,
        }
    }

    #[tokio::test]
    async fn test_clean_run_exits_zero() {
        let (_temp, config) = project(&["api.yaml", "web.yaml"]);
        assert_eq!(run(args(config, None, false)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_manifest_sets_exit_code() {
        let (_temp, config) = project(&["bad.yaml", "ok.yaml"]);
        assert_eq!(run(args(config, None, false)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_best_effort_ignores_failed_manifests() {
        let (_temp, config) = project(&["bad.yaml", "ok.yaml"]);
        assert_eq!(run(args(config, None, true)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_text_output_runs_through_console() {
        let (_temp, config) = project(&["bad.yaml"]);
        let mut args = args(config, None, false);
        args.output = OutputFormat::Text;
        assert_eq!(run(args).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let (temp, config) = project(&[]);
        let missing = temp.path().join("nope");
        let err = run(args(config, Some(missing), false)).await.unwrap_err();
        assert!(err.to_string().contains("Cannot build deployment plan"));
    }
}
