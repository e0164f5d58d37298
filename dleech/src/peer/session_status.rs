/// The four protocol flags of one peer connection, from our side.
///
/// A session starts choked in both directions with no interest declared.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// We are choking the peer
    pub am_choking: bool,
    /// We are interested in the peer
    pub am_interested: bool,
    /// The peer is choking us
    pub peer_choking: bool,
    /// The peer is interested in us
    pub peer_interested: bool,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self {
            am_choking: true,
            am_interested: false,
            peer_choking: true,
            peer_interested: false,
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_flags() {
        let status = SessionStatus::new();

        assert!(status.am_choking);
        assert!(!status.am_interested);
        assert!(status.peer_choking);
        assert!(!status.peer_interested);
    }
}
