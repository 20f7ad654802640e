use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use kitchen_core::models::ViewMode;

#[derive(Parser)]
#[command(name = "kitchen")]
#[command(about = "Keep track of what is in the kitchen, and where")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// CLI profile name for backend and session configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Run against a built-in in-memory inventory instead of Supabase
    #[arg(long, global = true)]
    pub demo: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List items, optionally filtered
    #[command(alias = "ls")]
    List {
        /// Case-insensitive text to match against any item field
        #[arg(short, long)]
        search: Option<String>,
        /// Exact category, or "All"
        #[arg(short, long)]
        category: Option<String>,
        /// Layout
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show items grouped by storage location
    Locations {
        /// Only show the items stored at this location
        #[arg(long, value_name = "LOCATION")]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item
    #[command(alias = "new")]
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long, allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long)]
        location: String,
        #[arg(long)]
        description: Option<String>,
        /// Image file to upload and attach
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    /// Edit an existing item
    Edit {
        /// Item ID
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete an item
    #[command(alias = "rm")]
    Delete {
        /// Item ID
        id: String,
    },
    /// Upload an image and attach it to an item
    Upload {
        /// Item ID
        id: String,
        /// Image file
        path: PathBuf,
    },
    /// Keep the inventory on screen and redraw on every remote change
    Watch {
        /// Layout
        #[arg(long, value_enum)]
        view: Option<ViewArg>,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Authenticate CLI profile with Supabase
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ViewArg {
    Grid,
    List,
}

impl From<ViewArg> for ViewMode {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Grid => Self::Grid,
            ViewArg::List => Self::List,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Storage bucket for item images
        #[arg(long, value_name = "NAME")]
        bucket: Option<String>,
        /// Seconds between change polls while watching
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved profile
    Show,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Create an account and store the session in the keychain
    Signup {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Full name saved on the profile
        #[arg(long, value_name = "NAME")]
        name: Option<String>,
    },
    /// Login with email/password and store the session in the keychain
    Login {
        #[arg(long, value_name = "EMAIL")]
        email: String,
        #[arg(long, value_name = "PASSWORD")]
        password: String,
        /// Screen that asked for the sign-in
        #[arg(long, value_name = "PATH")]
        next: Option<String>,
    },
    /// Show auth status for profile
    Status,
    /// Logout profile and clear stored session
    Logout,
}
