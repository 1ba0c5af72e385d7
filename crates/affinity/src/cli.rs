//! Command line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Installs placement rules that pin the primary replica to one domain of a region.
#[derive(Parser)]
#[command(name = "affinity")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a rule for a pool and install it on the cluster.
    CreatePoolRule(PoolRuleArgs),
    /// Show the rule that would be created, without installing it.
    PreviewRule(PoolRuleArgs),
    /// Render a rule offline with an explicit id.
    RenderRule(RenderRuleArgs),
    /// Run the lifecycle service until interrupted.
    Serve,
    /// Print version information.
    Version,
}

/// Arguments shared by the create and preview commands.
#[derive(Args)]
pub struct PoolRuleArgs {
    /// Pool name; the rule is named after it.
    #[arg(short, long)]
    pub pool: String,

    /// Region prefix shared by the three domains.
    #[arg(short, long)]
    pub region: String,

    /// Domain holding the primary replica.
    #[arg(long)]
    pub pd: String,

    /// Domain holding the secondary replica.
    #[arg(long)]
    pub sd: String,

    /// Domain holding the tertiary replica.
    #[arg(long)]
    pub td: String,

    /// Output format (text, json).
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the render-rule command.
#[derive(Args)]
pub struct RenderRuleArgs {
    /// Rule name.
    #[arg(short, long)]
    pub name: String,

    /// Rule id.
    #[arg(short, long, allow_negative_numbers = true)]
    pub id: i64,

    /// Region prefix shared by the three domains.
    #[arg(short, long)]
    pub region: String,

    /// Domain holding the primary replica.
    #[arg(long)]
    pub pd: String,

    /// Domain holding the secondary replica.
    #[arg(long)]
    pub sd: String,

    /// Domain holding the tertiary replica.
    #[arg(long)]
    pub td: String,
}

/// Output format for CLI commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["affinity", "version"]);
        assert!(matches!(cli.command, Commands::Version));
        assert!(cli.config.is_none());

        let cli = Cli::parse_from(["affinity", "serve", "--config", "/etc/affinity.toml"]);
        assert!(matches!(cli.command, Commands::Serve));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/affinity.toml")));
    }

    #[test]
    fn test_create_pool_rule_parsing() {
        let cli = Cli::parse_from([
            "affinity",
            "create-pool-rule",
            "--pool",
            "poolX",
            "--region",
            "dc1-",
            "--pd",
            "rackA",
            "--sd",
            "rackB",
            "--td",
            "rackC",
        ]);
        if let Commands::CreatePoolRule(args) = cli.command {
            assert_eq!(args.pool, "poolX");
            assert_eq!(args.region, "dc1-");
            assert_eq!(args.pd, "rackA");
            assert_eq!(args.sd, "rackB");
            assert_eq!(args.td, "rackC");
            assert_eq!(args.format, OutputFormat::Text);
        } else {
            panic!("Expected CreatePoolRule command");
        }
    }

    #[test]
    fn test_preview_rule_json_format() {
        let cli = Cli::parse_from([
            "affinity",
            "preview-rule",
            "-p",
            "poolX",
            "-r",
            "dc1-",
            "--pd",
            "a",
            "--sd",
            "b",
            "--td",
            "c",
            "--format",
            "json",
        ]);
        if let Commands::PreviewRule(args) = cli.command {
            assert_eq!(args.format, OutputFormat::Json);
        } else {
            panic!("Expected PreviewRule command");
        }
    }

    #[test]
    fn test_render_rule_parsing() {
        let cli = Cli::parse_from([
            "affinity", "render-rule", "--name", "r", "--id", "7", "--region", "dc1-", "--pd",
            "rackA", "--sd", "rackB", "--td", "rackC",
        ]);
        if let Commands::RenderRule(args) = cli.command {
            assert_eq!(args.name, "r");
            assert_eq!(args.id, 7);
        } else {
            panic!("Expected RenderRule command");
        }
    }

    #[test]
    fn test_missing_domain_is_rejected() {
        let result = Cli::try_parse_from([
            "affinity",
            "create-pool-rule",
            "--pool",
            "poolX",
            "--region",
            "dc1-",
            "--pd",
            "rackA",
            "--sd",
            "rackB",
        ]);
        assert!(result.is_err());
    }
}
