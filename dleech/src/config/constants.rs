pub const TCP_PORT: &str = "TCP_PORT";
pub const DOWNLOAD_DIRECTORY: &str = "DOWNLOAD_DIRECTORY";
pub const CONNECT_SECONDS_TIMEOUT: &str = "CONNECT_SECONDS_TIMEOUT";
pub const READ_SECONDS_TIMEOUT: &str = "READ_SECONDS_TIMEOUT";
pub const STALL_RECEIVE_LIMIT: &str = "STALL_RECEIVE_LIMIT";
pub const INITIAL_PEER_TARGET: &str = "INITIAL_PEER_TARGET";
pub const ACTIVE_PEER_TARGET: &str = "ACTIVE_PEER_TARGET";
pub const MAX_PEER_TARGET: &str = "MAX_PEER_TARGET";

/// Every setting above is required.
pub const MIN_SETTINGS: usize = 8;
