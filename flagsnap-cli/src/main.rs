mod get;
mod refresh;
mod remote;
mod server;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "flagsnap")]
#[command(version)]
#[command(about = "Feature-flag snapshot distribution at the edge", long_about = None)]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the snapshot edge server
    Serve {
        /// Port to listen on
        #[arg(short = 'p', long = "port")]
        port: Option<u16>,

        /// Hostname to bind to
        #[arg(long = "hostname")]
        hostname: Option<String>,

        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "fsnap.toml")]
        config: String,
    },
    /// Force a running server to refresh from the upstream
    Refresh {
        /// Server base URL, e.g. https://flags.example.com
        #[arg(short = 'r', long = "remote")]
        remote: Option<String>,

        /// Refresh secret (overrides FSNAP_REFRESH_TOKEN and config)
        #[arg(short = 's', long = "secret")]
        secret: Option<String>,

        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "fsnap.toml")]
        config: String,
    },
    /// Fetch the current snapshot envelope and print it
    Get {
        /// Server base URL, e.g. https://flags.example.com
        #[arg(short = 'r', long = "remote")]
        remote: Option<String>,

        /// Bypass the server's durable cache
        #[arg(long = "force")]
        force: bool,

        /// Path to config file
        #[arg(short = 'c', long = "config", default_value = "fsnap.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.cmd {
        Command::Serve {
            port,
            hostname,
            config,
        } => {
            server::run_serve(&config, port, hostname).await;
        }
        Command::Refresh {
            remote,
            secret,
            config,
        } => {
            refresh::run_refresh(remote.as_deref(), secret.as_deref(), &config).await;
        }
        Command::Get {
            remote,
            force,
            config,
        } => {
            get::run_get(remote.as_deref(), force, &config).await;
        }
    }
}
