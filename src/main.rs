#[macro_use]
extern crate error_chain;

mod checkip;
mod cli;
mod cloud;
mod config;
mod errors;
mod iprules;
mod output;

use crate::checkip::CheckIp;
use crate::cloud::aws::AwsCloud;
use crate::errors::*;
use std::env;
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(ref e) = run() {
        if let ErrorKind::Clap(ref err) = *e.kind() {
            err.exit();
        }
        if e.is_informational() {
            println!("{}", e);
            return;
        }
        eprintln!("error: {}", e);
        for cause in e.iter().skip(1) {
            eprintln!("caused by: {}", cause);
        }
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let invocation = cli::parse_from_safe(env::args_os())?;
    setup_logging(invocation.settings.verbosity);
    init_ssl_certs();

    let cloud = AwsCloud::new(&invocation.settings)?;
    let checkip = CheckIp::new(invocation.settings.checkip_url.as_str());

    let detail = invocation.command.detail();
    let outcome = cli::dispatch(invocation.command, &cloud, &checkip)?;
    println!("{}", output::render(&outcome, detail)?);
    Ok(())
}

#[allow(deprecated)]
fn init_ssl_certs() {
    openssl_probe::init_ssl_cert_env_vars();
}

fn setup_logging(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
