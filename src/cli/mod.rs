// CLI interface
pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use prx_aws_creds::{Result, Settings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "prx-aws-creds")]
#[command(about = "Temporary AWS credentials for named profiles", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// AWS profile to resolve
    #[arg(long, global = true, env = "AWS_PROFILE", default_value = "prx-legacy")]
    pub profile: String,

    /// AWS config file (defaults to ~/.aws/config)
    #[arg(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Directory for cached temporary credentials
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print credentials as shell export statements
    Export {
        /// Output in JSON format for scripting
        #[arg(long)]
        json: bool,
    },

    /// Execute a command with AWS credentials
    Exec {
        /// Command to execute
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Show the identity the profile's credentials belong to
    Whoami,

    /// List configured profiles and how each one authenticates
    Profiles {
        /// Output in JSON format for scripting
        #[arg(long)]
        json: bool,
    },

    /// Make sure a valid SSO access token exists for the profile
    Login,

    /// Generate shell completion scripts
    ///
    /// INSTALLATION:
    ///
    /// Bash:
    ///   eval "$(prx-aws-creds completions bash)"    # Add to ~/.bashrc
    ///
    /// Zsh:
    ///   eval "$(prx-aws-creds completions zsh)"     # Add to ~/.zshrc
    ///
    /// Fish:
    ///   prx-aws-creds completions fish > ~/.config/fish/completions/prx-aws-creds.fish
    Completions {
        /// Shell type to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl Cli {
    /// Settings from defaults, the settings file and environment, with CLI
    /// flags applied last
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load()?;
        if let Some(path) = &self.config_file {
            settings.aws_config_file = path.clone();
        }
        if let Some(path) = &self.cache_dir {
            settings.credential_cache_dir = path.clone();
        }
        Ok(settings)
    }
}

pub fn execute(args: Cli) -> Result<()> {
    if let Commands::Completions { shell } = &args.command {
        commands::completions::execute(shell.clone());
        return Ok(());
    }

    let settings = args.settings()?;
    let profile = args.profile.as_str();

    match args.command {
        Commands::Export { json } => commands::export::execute(settings, profile, json),
        Commands::Exec { command } => commands::exec::execute(settings, profile, command),
        Commands::Whoami => commands::whoami::execute(settings, profile),
        Commands::Profiles { json } => commands::profiles::execute(&settings, json),
        Commands::Login => commands::login::execute(&settings, profile),
        Commands::Completions { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_keeps_child_flags() {
        let cli = Cli::try_parse_from([
            "prx-aws-creds",
            "--profile",
            "dev",
            "exec",
            "--",
            "aws",
            "s3",
            "ls",
            "--recursive",
        ])
        .unwrap();

        assert_eq!(cli.profile, "dev");
        match cli.command {
            Commands::Exec { command } => {
                assert_eq!(command, vec!["aws", "s3", "ls", "--recursive"]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "prx-aws-creds",
            "export",
            "--json",
            "--config-file",
            "/tmp/aws-config",
        ])
        .unwrap();

        assert_eq!(cli.config_file, Some(PathBuf::from("/tmp/aws-config")));
        assert!(matches!(cli.command, Commands::Export { json: true }));
    }

    #[test]
    fn test_exec_requires_a_command() {
        assert!(Cli::try_parse_from(["prx-aws-creds", "exec"]).is_err());
    }
}
