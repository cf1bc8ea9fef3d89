mod config;
mod err;
mod http;
mod mime;
mod opt;
mod resolve;
mod routes;

use std::net::SocketAddr;

#[tokio::main]
async fn main() -> Result<(), err::DisplayError> {
    let opt::Options {
        verbose,
        port,
        host,
        root,
        index,
        fallback,
    } = clap::Parser::parse();

    env_logger::Builder::new()
        .filter_level(match verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        })
        .init();

    let config = config::Config::new(SocketAddr::new(host, port), &root, index, fallback)?;
    log::info!(
        "Serving {} with {:?} fallback to {}",
        config.root.display(),
        config.fallback,
        config.index
    );

    http::run_simple_server(
        config.listen,
        config,
        routes::respond_to_request,
        interrupted(),
    )
    .await?;

    Ok(())
}

async fn interrupted() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Interrupted"),
        Err(e) => {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending().await
        }
    }
}
