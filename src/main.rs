use clap::{Parser, Subcommand};
use rememberizer_mcp::Result;
use rememberizer_mcp::commands::{print_tools, serve_mcp, show_config};
use rememberizer_mcp::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mcp-server-rememberizer")]
#[command(about = "MCP server exposing Rememberizer knowledge search and documents")]
#[command(version)]
struct Cli {
    /// Path to a config.toml overriding the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio (default)
    Serve,
    /// Show the effective configuration
    Config,
    /// Print the tool catalog as JSON
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = Config::load(cli.config.as_deref())?;
            serve_mcp(&config).await?;
        }
        Commands::Config => {
            let config = Config::load(cli.config.as_deref())?;
            show_config(&config, cli.config.as_deref())?;
        }
        Commands::Tools => {
            print_tools()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["mcp-server-rememberizer"]).expect("parses");
        assert!(cli.command.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn serve_command() {
        let cli = Cli::try_parse_from(["mcp-server-rememberizer", "serve"]).expect("parses");
        assert!(matches!(cli.command, Some(Commands::Serve)));
    }

    #[test]
    fn config_path_is_global() {
        let cli = Cli::try_parse_from([
            "mcp-server-rememberizer",
            "config",
            "--config",
            "/tmp/rememberizer.toml",
        ])
        .expect("parses");

        assert!(matches!(cli.command, Some(Commands::Config)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/rememberizer.toml")));
    }

    #[test]
    fn tools_command() {
        let cli = Cli::try_parse_from(["mcp-server-rememberizer", "tools"]).expect("parses");
        assert!(matches!(cli.command, Some(Commands::Tools)));
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["mcp-server-rememberizer", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["mcp-server-rememberizer", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
