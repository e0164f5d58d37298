use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use crate::{peer::bt_peer::BtPeer, pieces::piece_manager::PieceManager};

/// Connection state of one peer endpoint, as shown to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

/// Observer view of one peer.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub status: ConnectionStatus,
    /// Kilobits per second over the last stored piece; `None` until a
    /// session has measured one.
    pub download_speed: Option<f64>,
}

/// A Struct that represents the current status of the swarm.
///
/// It is `Atomic`, meaning that it can be accessed from multiple threads at
/// the same time: peer sessions and the coordinator write counters and
/// per-peer state here, the UI polls read-only snapshots.
///
/// It also carries the global shutdown flag every session observes between
/// receive iterations.
#[derive(Debug, Default)]
pub struct AtomicSwarmStatus {
    attempted: AtomicUsize,
    active: AtomicUsize,
    shutdown: AtomicBool,
    peers: Mutex<HashMap<BtPeer, PeerSnapshot>>,
}

/// Posible swarm status errors.
#[derive(Debug)]
pub enum AtomicSwarmStatusError {
    PoisonedPeersLock,
}

/// Read-only counters for the UI. Polled at any rate; never pushed.
#[derive(Debug, Clone)]
pub struct SwarmSnapshot {
    pub downloaded_bytes: u64,
    pub completed_pieces: usize,
    pub total_pieces: usize,
    pub active_peers: usize,
    pub attempted_peers: usize,
    pub peers: Vec<(BtPeer, PeerSnapshot)>,
}

impl AtomicSwarmStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a session launch for `peer`.
    pub fn peer_connecting(&self, peer: &BtPeer) -> Result<(), AtomicSwarmStatusError> {
        self.attempted.fetch_add(1, Ordering::Relaxed);
        let mut peers = self.lock_peers()?;
        peers.insert(
            peer.clone(),
            PeerSnapshot {
                status: ConnectionStatus::Connecting,
                download_speed: None,
            },
        );
        Ok(())
    }

    /// Marks `peer` connected after a completed handshake.
    pub fn peer_connected(&self, peer: &BtPeer) -> Result<(), AtomicSwarmStatusError> {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.set_peer_status(peer, ConnectionStatus::Connected)
    }

    /// Marks a connect or handshake failure; the session never got active.
    pub fn peer_connect_failed(&self, peer: &BtPeer) -> Result<(), AtomicSwarmStatusError> {
        self.set_peer_status(peer, ConnectionStatus::Closed)
    }

    /// Marks a previously-connected `peer` gone.
    pub fn peer_disconnected(&self, peer: &BtPeer) -> Result<(), AtomicSwarmStatusError> {
        let previous = self.active.load(Ordering::Relaxed);
        if previous > 0 {
            self.active.fetch_sub(1, Ordering::Relaxed);
        }
        self.set_peer_status(peer, ConnectionStatus::Closed)
    }

    /// Updates the last measured download speed of `peer`.
    pub fn update_download_speed(
        &self,
        peer: &BtPeer,
        kilobits_per_second: f64,
    ) -> Result<(), AtomicSwarmStatusError> {
        let mut peers = self.lock_peers()?;
        if let Some(snapshot) = peers.get_mut(peer) {
            snapshot.download_speed = Some(kilobits_per_second);
        }
        Ok(())
    }

    pub fn active_peers(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn attempted_peers(&self) -> usize {
        self.attempted.load(Ordering::Relaxed)
    }

    /// Raises the global shutdown flag. Sessions observe it at least once
    /// per receive cycle and close cleanly.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Builds the observer snapshot, reading progress from the piece
    /// manager so the displayed count is the verified one.
    pub fn snapshot(
        &self,
        piece_manager: &PieceManager,
    ) -> Result<SwarmSnapshot, AtomicSwarmStatusError> {
        let (completed_pieces, total_pieces) = piece_manager.progress();
        let peers = self
            .lock_peers()?
            .iter()
            .map(|(peer, snapshot)| (peer.clone(), snapshot.clone()))
            .collect();

        Ok(SwarmSnapshot {
            downloaded_bytes: piece_manager.downloaded_bytes(),
            completed_pieces,
            total_pieces,
            active_peers: self.active_peers(),
            attempted_peers: self.attempted_peers(),
            peers,
        })
    }

    fn set_peer_status(
        &self,
        peer: &BtPeer,
        status: ConnectionStatus,
    ) -> Result<(), AtomicSwarmStatusError> {
        let mut peers = self.lock_peers()?;
        match peers.get_mut(peer) {
            Some(snapshot) => snapshot.status = status,
            None => {
                peers.insert(
                    peer.clone(),
                    PeerSnapshot {
                        status,
                        download_speed: None,
                    },
                );
            }
        }
        Ok(())
    }

    fn lock_peers(
        &self,
    ) -> Result<MutexGuard<HashMap<BtPeer, PeerSnapshot>>, AtomicSwarmStatusError> {
        self.peers
            .lock()
            .map_err(|_| AtomicSwarmStatusError::PoisonedPeersLock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::thread;

    fn create_test_peer(last_octet: u8) -> BtPeer {
        BtPeer::new(Ipv4Addr::new(10, 0, 0, last_octet), 6881)
    }

    #[test]
    fn test_starting_counters() {
        let status = AtomicSwarmStatus::new();

        assert_eq!(status.active_peers(), 0);
        assert_eq!(status.attempted_peers(), 0);
        assert!(!status.is_shutdown());
    }

    #[test]
    fn test_peer_lifecycle() {
        let status = AtomicSwarmStatus::new();
        let peer = create_test_peer(1);

        status.peer_connecting(&peer).unwrap();
        assert_eq!(status.attempted_peers(), 1);

        status.peer_connected(&peer).unwrap();
        assert_eq!(status.active_peers(), 1);

        status.peer_disconnected(&peer).unwrap();
        assert_eq!(status.active_peers(), 0);
    }

    #[test]
    fn test_disconnect_without_connect_does_not_underflow() {
        let status = AtomicSwarmStatus::new();
        let peer = create_test_peer(1);

        status.peer_disconnected(&peer).unwrap();

        assert_eq!(status.active_peers(), 0);
    }

    #[test]
    fn test_connect_failed_closes_peer() {
        let status = AtomicSwarmStatus::new();
        let peer = create_test_peer(1);

        status.peer_connecting(&peer).unwrap();
        status.peer_connect_failed(&peer).unwrap();

        let peers = status.peers.lock().unwrap();
        assert_eq!(peers[&peer].status, ConnectionStatus::Closed);
        assert_eq!(status.active_peers(), 0);
    }

    #[test]
    fn test_shutdown_flag() {
        let status = AtomicSwarmStatus::new();

        status.request_shutdown();

        assert!(status.is_shutdown());
    }

    #[test]
    fn test_multiple_threads_active_peers() {
        let status = Arc::new(AtomicSwarmStatus::new());
        let mut joins = Vec::new();

        for i in 0..10 {
            let status = status.clone();
            joins.push(thread::spawn(move || {
                let peer = create_test_peer(i);
                status.peer_connecting(&peer).unwrap();
                status.peer_connected(&peer).unwrap();
            }));
        }
        for join in joins {
            join.join().unwrap();
        }

        assert_eq!(status.active_peers(), 10);
        assert_eq!(status.attempted_peers(), 10);
    }

    #[test]
    fn test_snapshot_reflects_manager_progress() {
        use crate::metainfo::info::{FileRecord, Info};
        use crate::metainfo::metainfo::Metainfo;
        use sha1::{Digest, Sha1};

        let payload = b"0123456789abcdef0123456789abcdef0123456789";
        let metainfo = Arc::new(Metainfo {
            announce_list: vec![vec!["http://t/announce".to_string()]],
            info: Info {
                name: "snap".to_string(),
                piece_length: 16,
                piece_hashes: payload
                    .chunks(16)
                    .map(|chunk| Sha1::digest(chunk).into())
                    .collect(),
                total_length: payload.len() as u64,
                files: vec![FileRecord {
                    path: vec!["snap".to_string()],
                    length: payload.len() as u64,
                    offset: 0,
                }],
            },
            info_hash: [0u8; 20],
        });
        let manager = PieceManager::new(metainfo);
        manager.assign("10.0.0.1:6881").unwrap();
        manager.store_piece(0, &payload[0..16]).unwrap();

        let status = AtomicSwarmStatus::new();
        let peer = create_test_peer(1);
        status.peer_connecting(&peer).unwrap();
        status.peer_connected(&peer).unwrap();

        let snapshot = status.snapshot(&manager).unwrap();

        assert_eq!(snapshot.completed_pieces, 1);
        assert_eq!(snapshot.total_pieces, 3);
        assert_eq!(snapshot.downloaded_bytes, 16);
        assert_eq!(snapshot.active_peers, 1);
        assert_eq!(snapshot.attempted_peers, 1);
        assert_eq!(snapshot.peers.len(), 1);
    }

    #[test]
    fn test_update_download_speed() {
        let status = AtomicSwarmStatus::new();
        let peer = create_test_peer(1);

        status.peer_connecting(&peer).unwrap();
        status.update_download_speed(&peer, 1500.0).unwrap();

        let peers = status.peers.lock().unwrap();
        assert_eq!(peers[&peer].download_speed, Some(1500.0));
    }
}
