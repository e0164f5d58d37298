/// `TrackerUrl` struct containing a tracker url information.
///
/// To create a new `TrackerUrl` use the method builder `parse()`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TrackerUrl {
    pub protocol: ConnectionProtocol,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
}

/// Posible `TrackerUrl` Connection Protocol values.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ConnectionProtocol {
    Http,
    Https,
    Udp,
}

/// Posible `TrackerUrl` Errors.
#[derive(Debug, PartialEq, Eq)]
pub enum TrackerUrlError {
    InvalidTrackerUrl,
    UnsupportedConnectionProtocol,
    InvalidPortNumber,
}

impl TrackerUrl {
    /// Builds a new `TrackerUrl` from a &str tracker url.
    ///
    /// It returns a `TrackerUrlError` if:
    /// - the url format is invalid.
    /// - The url connection protocol is unsupported.
    /// - the url port number is not a number.
    pub fn parse(url: &str) -> Result<Self, TrackerUrlError> {
        let (rest, protocol) = Self::split_protocol(url)?;

        // UDP announce urls often come without a path; HTTP ones carry
        // their endpoint (usually "announce").
        let (authority, endpoint) = match rest.split_once('/') {
            Some((authority, endpoint)) => (authority, endpoint.to_string()),
            None => (rest, String::new()),
        };

        let (host, port) = Self::split_host_port(authority, &protocol)?;

        Ok(Self {
            protocol,
            host,
            port,
            endpoint,
        })
    }

    fn split_protocol(url: &str) -> Result<(&str, ConnectionProtocol), TrackerUrlError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or(TrackerUrlError::InvalidTrackerUrl)?;

        let protocol = match scheme {
            "http" => ConnectionProtocol::Http,
            "https" => ConnectionProtocol::Https,
            "udp" => ConnectionProtocol::Udp,
            _ => return Err(TrackerUrlError::UnsupportedConnectionProtocol),
        };
        Ok((rest, protocol))
    }

    fn split_host_port(
        authority: &str,
        protocol: &ConnectionProtocol,
    ) -> Result<(String, u16), TrackerUrlError> {
        match authority.split_once(':') {
            Some((host, port)) => {
                if host.is_empty() {
                    return Err(TrackerUrlError::InvalidTrackerUrl);
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|_| TrackerUrlError::InvalidPortNumber)?;
                Ok((host.to_string(), port))
            }
            None => {
                if authority.is_empty() {
                    return Err(TrackerUrlError::InvalidTrackerUrl);
                }
                let port = match protocol {
                    ConnectionProtocol::Https => 443,
                    ConnectionProtocol::Http | ConnectionProtocol::Udp => 80,
                };
                Ok((authority.to_string(), port))
            }
        }
    }
}
