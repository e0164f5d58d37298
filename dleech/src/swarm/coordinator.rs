use std::{
    collections::HashSet,
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{
    config::cfg::Cfg,
    metainfo::metainfo::Metainfo,
    peer::{bt_peer::BtPeer, peer_session::PeerSession},
    pieces::piece_manager::PieceManager,
    storage::file_writer::FileWriter,
    swarm::status::{AtomicSwarmStatus, AtomicSwarmStatusError},
};

/// Delay between session launches in the initial burst.
const INITIAL_LAUNCH_SPACING: Duration = Duration::from_millis(100);
/// Delay between session launches when topping up on a tick.
const TOPUP_LAUNCH_SPACING: Duration = Duration::from_millis(50);
/// Pause between coordinator ticks.
const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// New sessions launched per tick at most.
const MAX_LAUNCHES_PER_TICK: usize = 10;
/// Ticks without progress after which the active target starts rising.
const STALL_TICK_LIMIT: u32 = 5;
/// How much the active target rises per stalled tick past the limit.
const TARGET_RAISE_STEP: usize = 10;

/// Posible swarm coordinator errors.
#[derive(Debug)]
pub enum SwarmError {
    /// The tracker produced no usable peer endpoints; nothing to download
    /// from, so this is fatal.
    NoPeersAvailable,
    SpawnError(io::Error),
    SwarmStatusError(AtomicSwarmStatusError),
}

/// Launches and supervises the peer sessions of one download.
///
/// Starts with a burst of connection attempts, then tops the swarm up every
/// tick toward the active target, raising that target toward the configured
/// ceiling while progress is stalled. Terminates when the piece manager
/// reports completion or shutdown is signaled, and joins every session
/// before returning.
pub struct SwarmCoordinator {
    metainfo: Arc<Metainfo>,
    piece_manager: Arc<PieceManager>,
    file_writer: Arc<FileWriter>,
    swarm_status: Arc<AtomicSwarmStatus>,
    config: Cfg,
    client_peer_id: [u8; 20],
}

impl SwarmCoordinator {
    pub fn new(
        metainfo: Arc<Metainfo>,
        piece_manager: Arc<PieceManager>,
        file_writer: Arc<FileWriter>,
        swarm_status: Arc<AtomicSwarmStatus>,
        config: Cfg,
        client_peer_id: [u8; 20],
    ) -> Self {
        Self {
            metainfo,
            piece_manager,
            file_writer,
            swarm_status,
            config,
            client_peer_id,
        }
    }

    /// Drives the download against the given peer endpoints until it
    /// completes or shutdown is requested.
    pub fn run(&self, peers: Vec<BtPeer>) -> Result<(), SwarmError> {
        let peers = dedup_endpoints(peers);
        if peers.is_empty() {
            return Err(SwarmError::NoPeersAvailable);
        }
        info!(
            torrent = %self.metainfo.name(),
            peers = peers.len(),
            pieces = self.metainfo.total_pieces(),
            "starting swarm"
        );

        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        let mut attempted = 0;

        let initial = self.config.initial_peer_target.min(peers.len());
        while attempted < initial && !self.piece_manager.is_complete() {
            handles.push(self.launch_session(peers[attempted].clone())?);
            attempted += 1;
            thread::sleep(INITIAL_LAUNCH_SPACING);
        }

        let mut target = self.config.active_peer_target;
        let mut stall_ticks: u32 = 0;
        let mut last_completed = 0;

        while !self.piece_manager.is_complete() && !self.swarm_status.is_shutdown() {
            thread::sleep(TICK_INTERVAL);

            let snapshot = self
                .swarm_status
                .snapshot(&self.piece_manager)
                .map_err(SwarmError::SwarmStatusError)?;
            let active = snapshot.active_peers;
            let completed = snapshot.completed_pieces;
            info!(
                torrent = %self.metainfo.name(),
                "pieces downloaded: {} / {} ({} bytes, {} active peers)",
                completed,
                snapshot.total_pieces,
                snapshot.downloaded_bytes,
                active
            );

            if completed > last_completed {
                stall_ticks = 0;
                last_completed = completed;
            } else {
                stall_ticks += 1;
                if stall_ticks > STALL_TICK_LIMIT && target < self.config.max_peer_target {
                    target = (target + TARGET_RAISE_STEP).min(self.config.max_peer_target);
                    debug!("progress stalled, raising active peer target to {}", target);
                }
            }

            if active < target && attempted < peers.len() {
                let launches = (target - active)
                    .min(MAX_LAUNCHES_PER_TICK)
                    .min(peers.len() - attempted);
                for _ in 0..launches {
                    handles.push(self.launch_session(peers[attempted].clone())?);
                    attempted += 1;
                    thread::sleep(TOPUP_LAUNCH_SPACING);
                }
            }
        }

        // Completion and shutdown end the same way: every session is asked
        // to close and waited for.
        self.swarm_status.request_shutdown();
        for handle in handles {
            if handle.join().is_err() {
                warn!("a peer session thread panicked");
            }
        }
        Ok(())
    }

    fn launch_session(&self, peer: BtPeer) -> Result<JoinHandle<()>, SwarmError> {
        self.swarm_status
            .peer_connecting(&peer)
            .map_err(SwarmError::SwarmStatusError)?;

        let mut session = PeerSession::new(
            peer.clone(),
            self.metainfo.clone(),
            self.piece_manager.clone(),
            self.file_writer.clone(),
            self.swarm_status.clone(),
            self.config.clone(),
            self.client_peer_id,
        );

        let builder = thread::Builder::new().name(format!(
            "torrent: {} / peer: {}",
            self.metainfo.name(),
            peer
        ));
        builder
            .spawn(move || {
                if let Err(err) = session.run() {
                    debug!(peer = %peer, "peer session ended: {:?}", err);
                }
            })
            .map_err(SwarmError::SpawnError)
    }
}

/// Trackers occasionally repeat endpoints; one session per endpoint is
/// enough.
fn dedup_endpoints(peers: Vec<BtPeer>) -> Vec<BtPeer> {
    let mut seen = HashSet::new();
    peers
        .into_iter()
        .filter(|peer| seen.insert(peer.clone()))
        .collect()
}
