use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, DEFAULT_UNLOCK_DELAY_MS};
use crate::model::{Category, Role};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Base URL of the content API.
    #[arg(long, global = true, env = "PAYWALL_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// File holding the bearer token between runs.
    #[arg(long, global = true, env = "PAYWALL_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Keep the session in memory only.
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Per-request timeout.
    #[arg(
        long,
        global = true,
        env = "PAYWALL_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub timeout_secs: u64,

    /// Pause after a confirmed payment before access is re-checked.
    #[arg(
        long,
        global = true,
        env = "PAYWALL_UNLOCK_DELAY_MS",
        default_value_t = DEFAULT_UNLOCK_DELAY_MS
    )]
    pub unlock_delay_ms: u64,

    /// Print the simulated SMS code returned by demo servers.
    #[arg(long, global = true, env = "PAYWALL_SHOW_OTP_HINT")]
    pub show_otp_hint: bool,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Login(LoginArgs),
    Register(RegisterArgs),
    Logout,
    Whoami,
    Browse(BrowseArgs),
    Read(ReadArgs),
    Buy(BuyArgs),
    Bookmark(ContentArgs),
    Bookmarks,
    Dashboard,
    Payments,
    Progress(ProgressArgs),
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
}

impl Command {
    /// Subcommand name for logs; arguments may hold passwords.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Register(_) => "register",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Browse(_) => "browse",
            Self::Read(_) => "read",
            Self::Buy(_) => "buy",
            Self::Bookmark(_) => "bookmark",
            Self::Bookmarks => "bookmarks",
            Self::Dashboard => "dashboard",
            Self::Payments => "payments",
            Self::Progress(_) => "progress",
            Self::Profile { .. } => "profile",
            Self::Admin { .. } => "admin",
        }
    }
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long, env = "PAYWALL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long, env = "PAYWALL_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, Args)]
pub struct BrowseArgs {
    #[arg(long, value_enum)]
    pub category: Option<Category>,

    /// Matches title, author or description.
    #[arg(long)]
    pub search: Option<String>,

    #[arg(long)]
    pub featured: bool,
}

#[derive(Debug, Args)]
pub struct ContentArgs {
    /// Content id.
    pub id: i64,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Content id.
    pub id: i64,

    /// Reading size (12-24).
    #[arg(long, default_value_t = 16)]
    pub font_size: u8,
}

#[derive(Debug, Args)]
pub struct BuyArgs {
    /// Content id.
    pub id: i64,

    /// Mobile-money number to charge.
    #[arg(long)]
    pub phone: String,

    /// Confirmation code; prompted on stdin when omitted.
    #[arg(long)]
    pub otp: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProgressArgs {
    /// Content id.
    pub id: i64,

    /// Percentage read; omit to show the stored progress.
    #[arg(long)]
    pub percent: Option<f64>,

    #[arg(long, default_value_t = 0)]
    pub last_page: u32,
}

#[derive(Debug, Subcommand)]
pub enum ProfileCommand {
    Update(ProfileUpdateArgs),
    Avatar(AvatarArgs),
}

#[derive(Debug, Args)]
pub struct ProfileUpdateArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub current_password: Option<String>,

    #[arg(long)]
    pub new_password: Option<String>,
}

#[derive(Debug, Args)]
pub struct AvatarArgs {
    /// Image file (png, jpg, jpeg, gif, webp; up to 5 MB).
    pub file: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    Create(AdminCreateArgs),
    Update(AdminUpdateArgs),
    Delete(ContentArgs),
    Users {
        #[command(subcommand)]
        command: AdminUsersCommand,
    },
    /// Site totals and recent confirmed payments.
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum AdminUsersCommand {
    List,
    Role(UserRoleArgs),
    Delete(UserArgs),
}

#[derive(Debug, Args)]
pub struct UserArgs {
    /// User id.
    pub id: i64,
}

#[derive(Debug, Args)]
pub struct UserRoleArgs {
    /// User id.
    pub id: i64,

    #[arg(value_enum)]
    pub role: Role,
}

#[derive(Debug, Args)]
pub struct AdminCreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long, value_enum, default_value_t = Category::Article)]
    pub category: Category,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub preview_text: Option<String>,

    /// Plain-text body, ignored when --pdf is given.
    #[arg(long)]
    pub full_text: Option<String>,

    #[arg(long, default_value_t = 5000)]
    pub price: i64,

    #[arg(long)]
    pub featured: bool,

    #[arg(long)]
    pub cover: Option<PathBuf>,

    #[arg(long)]
    pub pdf: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct AdminUpdateArgs {
    /// Content id.
    pub id: i64,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long, value_enum)]
    pub category: Option<Category>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub preview_text: Option<String>,

    #[arg(long)]
    pub full_text: Option<String>,

    #[arg(long)]
    pub price: Option<i64>,

    #[arg(long)]
    pub featured: Option<bool>,

    #[arg(long)]
    pub cover: Option<PathBuf>,

    #[arg(long)]
    pub pdf: Option<PathBuf>,
}
