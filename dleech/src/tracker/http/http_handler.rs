use native_tls::Error;
use native_tls::HandshakeError;
use native_tls::TlsConnector;
use std::io::Error as IOError;
use std::io::{Read, Write};
use std::net::TcpStream;

use super::query_params::QueryParams;
use super::url_parser::TrackerUrl;

/// `HttpHandler` struct to make announce requests over **HTTP** or
/// **HTTPS**.
///
/// To create a new `HttpHandler` use the method builder `new()`.
#[derive(Debug)]
pub struct HttpHandler {
    tracker_url: TrackerUrl,
    query_params: QueryParams,
}

/// Posible `HttpHandler` errors
#[derive(Debug)]
pub enum HttpHandlerError {
    CreateTlsConnectorError(Error),
    TcpStreamConnectError(IOError),
    TlsStreamConnectError,
    ErrorWritingStream(IOError),
    ErrorReadingStream(IOError),
}

impl HttpHandler {
    /// Builds a new `HttpHandler` from a **TrackerUrl** and a **QueryParams** passed by paramaters.
    pub fn new(tracker_url: TrackerUrl, query_params: QueryParams) -> Self {
        Self {
            tracker_url,
            query_params,
        }
    }

    /// Makes a **HTTPS** announce request to the tracker url.
    ///
    /// On success it returns a `Vec<u8>` cointaining the response body.
    ///
    /// It returns an `HttpHandlerError` if:
    /// - There was a problem creating a TlsConnector.
    /// - There was a problem connecting to the tracker.
    /// - There was a problem writing or reading the tracker stream.
    pub fn https_request(&self) -> Result<Vec<u8>, HttpHandlerError> {
        let connector = TlsConnector::new().map_err(HttpHandlerError::CreateTlsConnectorError)?;
        let stream = self.connect_tcp_stream()?;
        let mut stream = match connector.connect(self.tracker_url.host.as_str(), stream) {
            Ok(stream) => stream,
            Err(HandshakeError::Failure(_)) | Err(HandshakeError::WouldBlock(_)) => {
                return Err(HttpHandlerError::TlsStreamConnectError)
            }
        };
        self.request_and_decode(&mut stream)
    }

    /// Makes a plain **HTTP** announce request to the tracker url.
    ///
    /// On success it returns a `Vec<u8>` cointaining the response body.
    pub fn http_request(&self) -> Result<Vec<u8>, HttpHandlerError> {
        self.request_and_decode(&mut self.connect_tcp_stream()?)
    }

    fn connect_tcp_stream(&self) -> Result<TcpStream, HttpHandlerError> {
        let connect_url = format!("{}:{}", self.tracker_url.host, self.tracker_url.port);
        TcpStream::connect(connect_url).map_err(HttpHandlerError::TcpStreamConnectError)
    }

    fn request_and_decode<A>(&self, stream: &mut A) -> Result<Vec<u8>, HttpHandlerError>
    where
        A: Write + Read,
    {
        let request = format!(
            "GET /{}{} HTTP/1.1\r\nHost: {}\r\nUser-Agent: dleech/0.1\r\nConnection: close\r\n\r\n",
            self.tracker_url.endpoint,
            self.query_params.build(),
            self.tracker_url.host
        );

        stream
            .write_all(request.as_bytes())
            .map_err(HttpHandlerError::ErrorWritingStream)?;

        let mut response = vec![];
        stream
            .read_to_end(&mut response)
            .map_err(HttpHandlerError::ErrorReadingStream)?;

        Ok(Self::strip_response_header(&response).to_vec())
    }

    /// The body starts after the first blank line of the response.
    fn strip_response_header(response: &[u8]) -> &[u8] {
        for (i, window) in response.windows(4).enumerate() {
            if window == b"\r\n\r\n" {
                return &response[i + 4..];
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_response_header() {
        let response = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\nd8:intervali900ee";

        assert_eq!(
            HttpHandler::strip_response_header(response),
            b"d8:intervali900ee"
        );
    }

    #[test]
    fn test_strip_response_header_without_header() {
        assert_eq!(
            HttpHandler::strip_response_header(b"d8:intervali900ee"),
            b"d8:intervali900ee"
        );
    }

    #[test]
    fn test_strip_response_header_empty_body() {
        assert_eq!(
            HttpHandler::strip_response_header(b"HTTP/1.1 200 OK\r\n\r\n"),
            b""
        );
    }
}
