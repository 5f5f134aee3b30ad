use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "mlwr",
    about = "MLWR malware repository: search and federation server",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the repository server
    Serve(ServeArgs),
    /// List configured remote instances
    Remotes(ConfigArgs),
    /// List searchable fields per object type
    Fields(FieldsArgs),
    /// Show the predicate a search query translates to
    Explain(ExplainArgs),
}

#[derive(Args)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
    /// Overrides `bind_addr` from the configuration
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct FieldsArgs {
    /// Only this type (`object`, `file`, `config`, `blob`)
    pub object_type: Option<String>,
}

#[derive(Args)]
pub struct ExplainArgs {
    /// Query tree as JSON
    pub query: String,
    /// Queried type
    #[arg(short = 't', long = "type", default_value = "object")]
    pub object_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["mlwr", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.bind.is_none());
            assert!(args.config.config.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_with_config() {
        let cli = Cli::try_parse_from([
            "mlwr", "serve", "--config", "/etc/mlwr.toml", "--bind", "0.0.0.0:8080",
        ]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:8080".parse().unwrap()));
            assert_eq!(args.config.config, Some(PathBuf::from("/etc/mlwr.toml")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn bad_bind_address_rejected() {
        assert!(Cli::try_parse_from(["mlwr", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn parse_remotes() {
        let cli = Cli::try_parse_from(["mlwr", "remotes", "-c", "mlwr.toml"]).unwrap();
        assert!(matches!(cli.command, Command::Remotes(_)));
    }

    #[test]
    fn parse_fields() {
        let cli = Cli::try_parse_from(["mlwr", "fields", "config"]).unwrap();
        if let Command::Fields(args) = cli.command {
            assert_eq!(args.object_type.as_deref(), Some("config"));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_explain() {
        let cli = Cli::try_parse_from(["mlwr", "explain", "-t", "file", "{}"]).unwrap();
        if let Command::Explain(args) = cli.command {
            assert_eq!(args.object_type, "file");
            assert_eq!(args.query, "{}");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn global_flags() {
        let cli = Cli::try_parse_from(["mlwr", "-v", "--format", "json", "fields"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }

    #[test]
    fn unknown_command() {
        assert!(Cli::try_parse_from(["mlwr", "frobnicate"]).is_err());
    }
}
