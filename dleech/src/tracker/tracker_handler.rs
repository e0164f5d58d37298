use std::sync::Arc;

use tracing::{info, warn};

use super::http::http_handler::{HttpHandler, HttpHandlerError};
use super::http::query_params::QueryParams;
use super::http::url_parser::{ConnectionProtocol, TrackerUrl, TrackerUrlError};
use super::tracker_response::{FromTrackerResponseError, TrackerResponse};
use super::udp_handler::{UdpHandler, UdpHandlerError};
use crate::metainfo::metainfo::Metainfo;

/// `TrackerHandler` struct for discovering peers from the torrent's
/// trackers.
///
/// Walks the announce tiers in order and returns the first response that
/// actually carries peers; individual tracker failures are logged and
/// skipped. The swarm only ever consumes the resulting endpoint list.
#[derive(Debug)]
pub struct TrackerHandler {
    metainfo: Arc<Metainfo>,
    client_port: u16,
    client_peer_id: [u8; 20],
}

/// Posible `TrackerHandler` errors.
#[derive(Debug)]
pub enum TrackerHandlerError {
    /// Every tracker in every tier failed or returned no peers.
    NoTrackerResponded,
    UrlParseError(TrackerUrlError),
    HttpHandlerError(HttpHandlerError),
    UdpHandlerError(UdpHandlerError),
    FromTrackerResponseError(FromTrackerResponseError),
}

impl TrackerHandler {
    pub fn new(metainfo: Arc<Metainfo>, client_port: u16, client_peer_id: [u8; 20]) -> Self {
        Self {
            metainfo,
            client_port,
            client_peer_id,
        }
    }

    /// Gets a peer list, trying each announce URL in tier order.
    pub fn get_peers(&self) -> Result<TrackerResponse, TrackerHandlerError> {
        for tier in &self.metainfo.announce_list {
            for announce_url in tier {
                info!(tracker = %announce_url, "announcing");
                match self.try_tracker(announce_url) {
                    Ok(response) if !response.peers.is_empty() => {
                        info!(
                            tracker = %announce_url,
                            peers = response.peers.len(),
                            "tracker peer list obtained"
                        );
                        return Ok(response);
                    }
                    Ok(_) => info!(tracker = %announce_url, "tracker returned no peers"),
                    Err(err) => warn!(tracker = %announce_url, "tracker failed: {:?}", err),
                }
            }
        }
        Err(TrackerHandlerError::NoTrackerResponded)
    }

    fn try_tracker(&self, announce_url: &str) -> Result<TrackerResponse, TrackerHandlerError> {
        let tracker_url =
            TrackerUrl::parse(announce_url).map_err(TrackerHandlerError::UrlParseError)?;

        match tracker_url.protocol {
            ConnectionProtocol::Http | ConnectionProtocol::Https => self.http_announce(tracker_url),
            ConnectionProtocol::Udp => self.udp_announce(tracker_url),
        }
    }

    fn http_announce(&self, tracker_url: TrackerUrl) -> Result<TrackerResponse, TrackerHandlerError> {
        let query_params = QueryParams::new(
            self.metainfo.info_hash,
            self.client_peer_id,
            self.client_port,
            self.metainfo.total_length(),
        );

        let is_https = tracker_url.protocol == ConnectionProtocol::Https;
        let http_handler = HttpHandler::new(tracker_url, query_params);
        let body = if is_https {
            http_handler.https_request()
        } else {
            http_handler.http_request()
        }
        .map_err(TrackerHandlerError::HttpHandlerError)?;

        TrackerResponse::from(body).map_err(TrackerHandlerError::FromTrackerResponseError)
    }

    fn udp_announce(&self, tracker_url: TrackerUrl) -> Result<TrackerResponse, TrackerHandlerError> {
        UdpHandler::new(
            tracker_url,
            self.metainfo.info_hash,
            self.client_peer_id,
            self.client_port,
            self.metainfo.total_length(),
        )
        .announce()
        .map_err(TrackerHandlerError::UdpHandlerError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metainfo::info::{FileRecord, Info};

    #[test]
    fn test_unparsable_announce_url_is_not_fatal_until_all_fail() {
        let metainfo = Arc::new(test_metainfo(vec![vec!["garbage".to_string()]]));
        let handler = TrackerHandler::new(metainfo, 6881, *b"-DL0001-abcdefghijkl");

        assert!(matches!(
            handler.get_peers(),
            Err(TrackerHandlerError::NoTrackerResponded)
        ));
    }

    fn test_metainfo(announce_list: Vec<Vec<String>>) -> Metainfo {
        Metainfo {
            announce_list,
            info: Info {
                name: "test".to_string(),
                piece_length: 16,
                piece_hashes: vec![[0u8; 20]],
                total_length: 16,
                files: vec![FileRecord {
                    path: vec!["test".to_string()],
                    length: 16,
                    offset: 0,
                }],
            },
            info_hash: [0u8; 20],
        }
    }
}
