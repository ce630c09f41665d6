use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true,
    args_conflicts_with_subcommands = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output logs as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    /// Directories to prepend to PATH (same as `qh path`)
    #[arg(value_hint = ValueHint::DirPath)]
    pub dirs: Vec<String>,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that every configured app path exists
    Check,

    /// Print a shell script that sets up the given apps and their dependencies
    #[command(arg_required_else_help = true)]
    Add {
        /// Apps to add
        #[arg(required = true)]
        apps: Vec<String>,
    },

    /// Print a shell script that prepends directories to PATH
    #[command(arg_required_else_help = true)]
    Path {
        /// Directories to prepend
        #[arg(required = true, value_hint = ValueHint::DirPath)]
        dirs: Vec<String>,
    },

    /// Download and unpack apps that have a url into their configured path
    #[command(arg_required_else_help = true)]
    #[clap(name = "install", visible_alias = "i")]
    Install {
        /// Apps to install, together with their dependencies
        #[arg(required = true)]
        apps: Vec<String>,

        /// Replace apps that are already present
        #[arg(required = false, short, long)]
        force: bool,
    },

    /// Download a package archive and unpack it into a directory
    #[command(arg_required_else_help = true)]
    Fetch {
        /// Archive URL (http, https or file)
        url: String,

        /// Destination directory
        #[arg(value_hint = ValueHint::DirPath)]
        dest: String,

        /// Remove the destination before unpacking
        #[arg(required = false, short, long)]
        force: bool,
    },
}
