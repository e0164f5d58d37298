use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use dleech::{
    config::cfg::Cfg,
    metainfo::parser::{MetainfoParser, ParseError},
    peer::generate_peer_id,
    pieces::piece_manager::PieceManager,
    storage::file_writer::FileWriter,
    swarm::{
        coordinator::{SwarmCoordinator, SwarmError},
        status::AtomicSwarmStatus,
    },
    tracker::tracker_handler::{TrackerHandler, TrackerHandlerError},
};

#[derive(Parser, Debug)]
#[command(about = "A BitTorrent v1 leeching client")]
struct Args {
    /// Path to the .torrent file
    #[arg(short, long)]
    file: PathBuf,
    /// Path to the config file
    #[arg(short, long, default_value = "config.cfg")]
    config: String,
    /// Overrides the configured download directory
    #[arg(short, long)]
    download_dir: Option<String>,
}

#[derive(Debug)]
enum ClientError {
    ConfigError(io::Error),
    ParseError(ParseError),
    StorageError(io::Error),
    TrackerError(TrackerHandlerError),
    SwarmError(SwarmError),
    Incomplete,
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => info!("download complete"),
        Err(err) => {
            error!("download failed: {:?}", err);
            process::exit(1);
        }
    }
}

fn run(args: Args) -> Result<(), ClientError> {
    let config = Cfg::new(&args.config).map_err(ClientError::ConfigError)?;
    let download_dir = args
        .download_dir
        .unwrap_or_else(|| config.download_directory.clone());

    let metainfo = Arc::new(MetainfoParser::parse(&args.file).map_err(ClientError::ParseError)?);
    info!(
        torrent = %metainfo.name(),
        size = metainfo.total_length(),
        pieces = metainfo.total_pieces(),
        files = metainfo.files().len(),
        "metainfo loaded"
    );

    let client_peer_id = generate_peer_id();
    let file_writer = Arc::new(
        FileWriter::create(metainfo.clone(), Path::new(&download_dir))
            .map_err(ClientError::StorageError)?,
    );
    let piece_manager = Arc::new(PieceManager::new(metainfo.clone()));
    let swarm_status = Arc::new(AtomicSwarmStatus::new());

    let tracker_handler = TrackerHandler::new(metainfo.clone(), config.tcp_port, client_peer_id);
    let response = tracker_handler
        .get_peers()
        .map_err(ClientError::TrackerError)?;

    let coordinator = SwarmCoordinator::new(
        metainfo,
        piece_manager.clone(),
        file_writer,
        swarm_status,
        config,
        client_peer_id,
    );
    coordinator.run(response.peers).map_err(ClientError::SwarmError)?;

    if piece_manager.is_complete() {
        Ok(())
    } else {
        Err(ClientError::Incomplete)
    }
}
