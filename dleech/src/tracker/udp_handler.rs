use std::io::Error as IOError;
use std::net::UdpSocket;
use std::time::Duration;

use rand::Rng;

use super::http::url_parser::TrackerUrl;
use super::tracker_response::TrackerResponse;
use crate::peer::bt_peer::BtPeer;

/// Magic protocol id opening every UDP tracker conversation.
const PROTOCOL_ID: u64 = 0x0417_2710_1980;
const ACTION_CONNECT: u32 = 0;
const ACTION_ANNOUNCE: u32 = 1;
/// Socket timeout for both tracker round trips.
const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// `UdpHandler` struct to make announce requests to a UDP tracker: the
/// two-step connect-then-announce exchange, each a single datagram round
/// trip with a random transaction id the response must echo.
#[derive(Debug)]
pub struct UdpHandler {
    tracker_url: TrackerUrl,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    client_port: u16,
    left: u64,
}

/// Posible `UdpHandler` errors.
#[derive(Debug)]
pub enum UdpHandlerError {
    SocketError(IOError),
    InvalidConnectResponse,
    InvalidAnnounceResponse,
    TransactionMismatch,
}

impl UdpHandler {
    pub fn new(
        tracker_url: TrackerUrl,
        info_hash: [u8; 20],
        peer_id: [u8; 20],
        client_port: u16,
        left: u64,
    ) -> Self {
        Self {
            tracker_url,
            info_hash,
            peer_id,
            client_port,
            left,
        }
    }

    /// Runs the connect and announce round trips and returns the peer list.
    pub fn announce(&self) -> Result<TrackerResponse, UdpHandlerError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(UdpHandlerError::SocketError)?;
        socket
            .set_read_timeout(Some(SOCKET_TIMEOUT))
            .map_err(UdpHandlerError::SocketError)?;
        socket
            .connect((self.tracker_url.host.as_str(), self.tracker_url.port))
            .map_err(UdpHandlerError::SocketError)?;

        let mut rng = rand::thread_rng();

        let transaction_id: u32 = rng.gen();
        socket
            .send(&build_connect_request(transaction_id))
            .map_err(UdpHandlerError::SocketError)?;
        let mut response = [0u8; 16];
        let received = socket
            .recv(&mut response)
            .map_err(UdpHandlerError::SocketError)?;
        let connection_id = parse_connect_response(&response[..received], transaction_id)?;

        let transaction_id: u32 = rng.gen();
        let request =
            self.build_announce_request(connection_id, transaction_id, rng.gen());
        socket
            .send(&request)
            .map_err(UdpHandlerError::SocketError)?;
        let mut response = [0u8; 4096];
        let received = socket
            .recv(&mut response)
            .map_err(UdpHandlerError::SocketError)?;
        parse_announce_response(&response[..received], transaction_id)
    }

    /// The 98-byte announce request of BEP 15.
    fn build_announce_request(
        &self,
        connection_id: u64,
        transaction_id: u32,
        key: u32,
    ) -> Vec<u8> {
        let mut request = Vec::with_capacity(98);
        request.extend(connection_id.to_be_bytes());
        request.extend(ACTION_ANNOUNCE.to_be_bytes());
        request.extend(transaction_id.to_be_bytes());
        request.extend(self.info_hash);
        request.extend(self.peer_id);
        request.extend(0u64.to_be_bytes()); // downloaded
        request.extend(self.left.to_be_bytes());
        request.extend(0u64.to_be_bytes()); // uploaded
        request.extend(0u32.to_be_bytes()); // event: none
        request.extend(0u32.to_be_bytes()); // ip: tracker sees it anyway
        request.extend(key.to_be_bytes());
        request.extend((-1i32).to_be_bytes()); // num_want: default
        request.extend(self.client_port.to_be_bytes());
        request
    }
}

/// The 16-byte connect request: protocol magic, action, transaction id.
fn build_connect_request(transaction_id: u32) -> [u8; 16] {
    let mut request = [0u8; 16];
    request[0..8].copy_from_slice(&PROTOCOL_ID.to_be_bytes());
    request[8..12].copy_from_slice(&ACTION_CONNECT.to_be_bytes());
    request[12..16].copy_from_slice(&transaction_id.to_be_bytes());
    request
}

/// Validates a connect response and extracts the connection id.
fn parse_connect_response(
    response: &[u8],
    transaction_id: u32,
) -> Result<u64, UdpHandlerError> {
    if response.len() < 16 {
        return Err(UdpHandlerError::InvalidConnectResponse);
    }
    let action = u32::from_be_bytes(response[0..4].try_into().unwrap_or_default());
    if action != ACTION_CONNECT {
        return Err(UdpHandlerError::InvalidConnectResponse);
    }
    let echoed = u32::from_be_bytes(response[4..8].try_into().unwrap_or_default());
    if echoed != transaction_id {
        return Err(UdpHandlerError::TransactionMismatch);
    }
    Ok(u64::from_be_bytes(
        response[8..16].try_into().unwrap_or_default(),
    ))
}

/// Validates an announce response and extracts the counters plus the
/// compact peer list that follows the fixed 20-byte head.
fn parse_announce_response(
    response: &[u8],
    transaction_id: u32,
) -> Result<TrackerResponse, UdpHandlerError> {
    if response.len() < 20 {
        return Err(UdpHandlerError::InvalidAnnounceResponse);
    }
    let action = u32::from_be_bytes(response[0..4].try_into().unwrap_or_default());
    if action != ACTION_ANNOUNCE {
        return Err(UdpHandlerError::InvalidAnnounceResponse);
    }
    let echoed = u32::from_be_bytes(response[4..8].try_into().unwrap_or_default());
    if echoed != transaction_id {
        return Err(UdpHandlerError::TransactionMismatch);
    }

    let interval = u32::from_be_bytes(response[8..12].try_into().unwrap_or_default());
    let leechers = u32::from_be_bytes(response[12..16].try_into().unwrap_or_default());
    let seeders = u32::from_be_bytes(response[16..20].try_into().unwrap_or_default());

    let peers = response[20..]
        .chunks_exact(6)
        .map(|chunk| {
            let mut entry = [0u8; 6];
            entry.copy_from_slice(chunk);
            BtPeer::from_compact(&entry)
        })
        .collect();

    Ok(TrackerResponse {
        interval: interval as i64,
        complete: seeders as i64,
        incomplete: leechers as i64,
        peers,
    })
}
