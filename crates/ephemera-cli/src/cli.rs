use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ephemera",
    about = "Ephemera: short-lived object storage for generated files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP server and the expiry loop
    Serve(ServeArgs),
    /// Reconcile a storage directory left by a previous process (the directory must not be in use)
    ///
    /// Discards staged partial writes, deletes objects past the retention
    /// window and reports the rest. Run it only while no server is using
    /// the directory: in-flight uploads of a running server would be
    /// discarded.
    Sweep(SweepArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub bind: Option<String>,
    /// Storage directory
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Retention window in seconds
    #[arg(long)]
    pub retention: Option<u64>,
}

#[derive(Args)]
pub struct SweepArgs {
    #[arg(long)]
    pub dir: PathBuf,
    /// Retention window in seconds
    #[arg(long)]
    pub retention: Option<u64>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve_defaults() {
        let cli = Cli::try_parse_from(["ephemera", "serve"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert!(args.config.is_none());
            assert!(args.bind.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "ephemera", "serve", "--bind", "0.0.0.0:9000", "--dir", "/tmp/eph", "--retention", "60",
        ])
        .unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.bind, Some("0.0.0.0:9000".into()));
            assert_eq!(args.dir, Some(PathBuf::from("/tmp/eph")));
            assert_eq!(args.retention, Some(60));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_sweep_requires_dir() {
        assert!(Cli::try_parse_from(["ephemera", "sweep"]).is_err());
        let cli = Cli::try_parse_from(["ephemera", "sweep", "--dir", "/tmp/eph"]).unwrap();
        assert!(matches!(cli.command, Command::Sweep(_)));
    }

    #[test]
    fn sweep_help_warns_about_live_directories() {
        use clap::CommandFactory;

        let cmd = Cli::command();
        let sweep = cmd.find_subcommand("sweep").unwrap();
        assert!(sweep.get_about().unwrap().to_string().contains("must not be in use"));
        assert!(sweep.get_long_about().unwrap().to_string().contains("no server is using"));
    }

    #[test]
    fn parse_verbose_global() {
        let cli = Cli::try_parse_from(["ephemera", "config", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Config(_)));
    }
}
