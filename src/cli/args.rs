//! Command-line interface definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// wasmdev - live build server for Go WebAssembly projects
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Host interface to bind in serve mode
    #[arg(long, global = true, default_value = "localhost")]
    pub host: String,

    /// Port to bind in serve mode
    #[arg(long, global = true, default_value_t = 8080)]
    pub port: u16,

    /// Directory containing the Go wasm module to build
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub www: Option<PathBuf>,

    /// Target build directory (a temporary folder when omitted)
    #[arg(long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// File extensions processed as build-info templates
    #[arg(
        long,
        global = true,
        value_delimiter = ',',
        default_value = ".gohtml,.gocss,.gojs,.gojson,.goxml"
    )]
    pub template_patterns: Vec<String>,

    /// JSON file with extra values, accessible in templates as {{.Extra}}
    #[arg(long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub extra: Option<PathBuf>,

    /// Recalculate all file hashes instead of relying on ModTime
    #[arg(long, global = true)]
    pub force_refresh: bool,

    /// Invoke `go generate ./...` before every build
    #[arg(long, global = true)]
    pub generate: bool,

    #[command(subcommand)]
    pub action: Action,
}

/// Available actions
#[derive(Subcommand, Debug, Clone)]
pub enum Action {
    /// Build the project once into the target directory
    Build,

    /// Build, watch and serve with hot reload
    Serve,

    /// Remove the target build directory
    Clean,

    /// Upload a directory tree to a remote host over SFTP
    DeploySftp(DeployArgs),
}

/// Deployment target arguments.
#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Remote host to deploy to
    #[arg(long = "deploy-host")]
    pub host: String,

    /// Remote SSH port
    #[arg(long = "deploy-port", default_value_t = 22)]
    pub port: u16,

    /// Remote user
    #[arg(long = "deploy-user")]
    pub user: String,

    /// Remote password (key or agent based auth when empty)
    #[arg(long = "deploy-password", default_value = "")]
    pub password: String,

    /// Local folder to upload
    #[arg(long = "deploy-src", value_hint = clap::ValueHint::DirPath)]
    pub src: PathBuf,

    /// Remote folder to upload into
    #[arg(long = "deploy-dst", default_value = ".")]
    pub dst: String,
}
