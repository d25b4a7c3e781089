use clap::Parser;
use gallery_common::DataLayout;
use gallery_server::core::ServerConfig;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "gallery-server")]
#[command(about = "Artwork gallery with live like counts")]
struct Cli {
    /// Listen port (defaults to GALLERY_PORT or 8000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Verbose logging and permissive CORS
    #[arg(long)]
    debug: bool,

    /// Data root (defaults to GALLERY_ROOT, the saved root, or ./gallery_data)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Cap on simultaneous real-time connections
    #[arg(long)]
    max_connections: Option<usize>,

    /// Save --data-dir as the default root for later runs
    #[arg(long, requires = "data_dir")]
    remember: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    gallery_server::init_tracing(cli.debug);

    let mut config = ServerConfig::default();
    config.debug = cli.debug;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = cli.data_dir {
        if cli.remember {
            gallery_common::save_persistent_root(dir.clone())?;
            info!("Saved {:?} as the default data root", dir);
        }
        config.layout = DataLayout::new(dir);
    }
    if cli.max_connections.is_some() {
        config.max_connections = cli.max_connections;
    }

    gallery_server::run(config).await
}
