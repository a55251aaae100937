use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    info!("Starting tag server on {}", config.address());
    info!(
        "Tick rate {} Hz, broadcast rate {} Hz, max {} clients",
        config.tick_rate, config.broadcast_rate, config.max_clients
    );

    let mut server = Server::new(&config).await?;
    server.run().await?;

    Ok(())
}
