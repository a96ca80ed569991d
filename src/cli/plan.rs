use super::console;
use super::{ConfigArgs, OutputFormat};
use crate::sequencer::build_plan;
use crate::Result;
use anyhow::Context;
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

/// Show the phases and files that `apply` would run, without applying
pub fn run(args: PlanArgs) -> Result<()> {
    let config = args.config.load()?;
    let plan = build_plan(&config).context("Cannot build deployment plan")?;

    match args.output.render(&plan)? {
        Some(rendered) => println!("{}", rendered),
        None => console::print_plan(&plan),
    }

    Ok(())
}
