use clap::{Parser, Subcommand};

use adsync_types::EntityRef;

#[derive(Parser)]
#[command(
    name = "adsync",
    about = "adsync - mirror local advertising entities to a remote ad server",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "ADSYNC_PORT")]
    pub port: Option<u16>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP daemon (default if no command specified)")]
    Serve {
        #[arg(short, long, env = "ADSYNC_PORT")]
        port: Option<u16>,
    },

    #[command(about = "Run the full sync pipeline once and print a per-step table")]
    Sync {
        #[arg(short, long, help = "Network to sync (remote id or local UUID); default: all")]
        network: Option<EntityRef>,

        #[arg(long, help = "Rerun entity steps once if they report nothing despite pending work")]
        fallback: bool,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },

    #[command(about = "Dry-run the validator without touching the store or the remote")]
    Validate {
        #[arg(short, long, help = "Network to validate (remote id or local UUID); default: all")]
        network: Option<EntityRef>,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },

    #[command(about = "Show pending entity counts per kind")]
    Pending {
        #[arg(short, long, help = "Network to count (remote id or local UUID); default: all")]
        network: Option<EntityRef>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_flag_accepts_both_id_spaces() {
        let cli = Cli::try_parse_from(["adsync", "sync", "--network", "9001"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Some(Commands::Sync { network: Some(EntityRef::Remote(9001)), fallback: false, json: false })
        ));

        let local = "4b5c2a9e-8f0a-4c3e-9a53-0d1f9f1c2b7e";
        let cli = Cli::try_parse_from(["adsync", "validate", "-n", local]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(cli.command, Some(Commands::Validate { network: Some(EntityRef::Local(_)), .. })));
    }

    #[test]
    fn test_bad_network_is_rejected() {
        assert!(Cli::try_parse_from(["adsync", "pending", "--network", "main"]).is_err());
    }

    #[test]
    fn test_no_command_means_serve() {
        let cli = Cli::try_parse_from(["adsync"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(cli.command.is_none());
    }
}
