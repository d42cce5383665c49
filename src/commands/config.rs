use clap::{Args, Subcommand};

use crate::config;

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand, Clone)]
enum ConfigSubcommand {
    /// Parse the config file and validate one or every profile
    Check {
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print where the config file is looked up
    Path,
}

pub fn run(args: ConfigArgs) -> Result<(), String> {
    match args.command {
        ConfigSubcommand::Check { profile } => {
            let path = config::validate_config(profile.as_deref())?;
            println!("config OK: {}", path.display());
        }
        ConfigSubcommand::Path => {
            println!("{}", config::config_path()?.display());
        }
    }
    Ok(())
}
