pub mod bt_peer;
pub mod handshake;
pub mod peer_message;
pub mod peer_session;
pub mod session_status;

use rand::{distributions::Alphanumeric, Rng};

/// Fixed client prefix of our peer id.
pub const CLIENT_PREFIX: &[u8; 8] = b"-DL0001-";

/// Generates the 20-byte local peer identity: the client prefix followed by
/// 12 random alphanumeric bytes. Generated once per process.
pub fn generate_peer_id() -> [u8; 20] {
    let mut peer_id = [0u8; 20];
    peer_id[..8].copy_from_slice(CLIENT_PREFIX);
    for (slot, random) in peer_id[8..]
        .iter_mut()
        .zip(rand::thread_rng().sample_iter(&Alphanumeric))
    {
        *slot = random;
    }
    peer_id
}
