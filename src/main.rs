//! chatbox - A terminal chat client with live rooms

use anyhow::{bail, Result};
use chatbox::client::{self, ChatExit};
use chatbox::config::Config;
use chatbox::credentials::CredentialStore;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chatbox")]
#[command(about = "A terminal chat client with live rooms")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        /// Account email
        email: String,
    },
    /// Create a new account
    Register {
        /// Account email
        email: String,
        /// Public username
        username: String,
    },
    /// Forget stored credentials
    Logout,
    /// Open the live chat (default)
    Chat,
    /// Show a profile
    Profile {
        /// User id; defaults to the logged in user
        uid: Option<String>,
    },
    /// Set the about text of your profile
    About {
        /// New about text
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Upload a new profile picture
    UploadPicture {
        /// Image file
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let store = CredentialStore::new(config.credentials_path());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Login { email } => {
            let password = client::read_password()?;
            client::login(&config, &store, &email, &password).await
        }
        Commands::Register { email, username } => {
            let password = client::read_password()?;
            client::register(&config, &store, &email, &username, &password).await
        }
        Commands::Logout => client::logout(&store),
        Commands::Chat => {
            tracing::info!("Connecting to {}", config.server.socket_url);
            match client::run_chat(&config, &store).await? {
                ChatExit::Quit => Ok(()),
                ChatExit::RedirectToLogin => {
                    bail!("Not logged in or session rejected; run `chatbox login <email>`")
                }
                ChatExit::ConnectionLost => bail!("Connection to the chat server was lost"),
            }
        }
        Commands::Profile { uid } => client::show_profile(&config, &store, uid).await,
        Commands::About { text } => client::set_about(&config, &store, &text.join(" ")).await,
        Commands::UploadPicture { path } => {
            if !client::upload_picture(&config, &store, &path).await? {
                bail!("Picture upload failed");
            }
            Ok(())
        }
    }
}
