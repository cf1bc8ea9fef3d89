use crate::resolve::Fallback;
use clap::{ArgAction, Parser};
use std::convert::Infallible;
use std::net::IpAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3783;

/// Serve a single-page app, answering unknown routes with its index.html
#[derive(Parser, Debug)]
#[clap(version, about)]
pub struct Options {
    /// Logging verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Port to listen on (falls back to 3783 if not a valid port)
    #[arg(default_value_t = DEFAULT_PORT, value_parser = port_or_default)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Directory to serve files from
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Entry document served for client-side routes
    #[arg(long, default_value = "index.html")]
    pub index: String,

    #[arg(
        long,
        value_enum,
        default_value_t = Fallback::Extension,
        help = "When to answer a missing path with the entry document (--help for more)",
        long_help = r"When to answer a missing path with the entry document:
    - extension: only for paths without a file extension; missing assets like /app.js 404
    - always: for every missing path"
    )]
    pub fallback: Fallback,
}

fn port_or_default(arg: &str) -> Result<u16, Infallible> {
    Ok(arg.trim().parse().unwrap_or(DEFAULT_PORT))
}
