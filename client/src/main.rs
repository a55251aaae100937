use clap::Parser;
use client::interpolation::INTERPOLATION_DELAY_MS;
use client::network::{Client, ClientOptions};
use client::prediction::ReconcileConfig;
use log::{error, info};
use macroquad::window::Conf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Room code to join; a new room is created when omitted
    #[arg(short = 'j', long)]
    join: Option<String>,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "1200")]
    width: i32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "700")]
    height: i32,

    /// How far behind the newest snapshot remote players are drawn
    #[arg(long, default_value_t = INTERPOLATION_DELAY_MS)]
    interp_delay: u64,

    /// Horizontal divergence tolerated before correcting the prediction
    #[arg(long, default_value = "6")]
    dead_zone_x: f32,

    /// Vertical divergence tolerated before correcting the prediction
    #[arg(long, default_value = "12")]
    dead_zone_y: f32,

    /// Fraction of the divergence corrected per snapshot
    #[arg(long, default_value = "0.3")]
    blend: f32,
}

impl Args {
    fn client_options(&self) -> ClientOptions {
        ClientOptions {
            name: self.name.clone(),
            join_code: self.join.clone(),
            fake_ping_ms: self.fake_ping,
            interpolation_delay_ms: self.interp_delay,
            reconcile: ReconcileConfig {
                dead_zone_x: self.dead_zone_x,
                dead_zone_y: self.dead_zone_y,
                blend: self.blend.clamp(0.0, 1.0),
                ..ReconcileConfig::default()
            },
        }
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Tag".to_string(),
        window_width: args.width,
        window_height: args.height,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: A/D or arrows to move, Space/W/Up to jump, Enter to start");
    info!("Press 1/2/3 to toggle Prediction/Reconciliation/Interpolation");

    let mut client = match Client::new(&args.server, args.client_options()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to start client: {}", e);
            return;
        }
    };

    if let Err(e) = client.run().await {
        error!("Client error: {}", e);
    }
}
