use std::fs::File;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::str::FromStr;

use super::constants;

/// `Cfg` struct containing the config file information, previusly created with `Cfg::new`.
///
/// - `tcp_port`: port announced to trackers as our listening port,
/// - `download_directory`: directory where the downloaded payload is stored,
/// - `connect_seconds_timeout`: timeout in seconds for the TCP connect to a peer,
/// - `read_seconds_timeout`: timeout in seconds for a single receive from a peer,
/// - `stall_receive_limit`: consecutive timed-out receives before a session closes,
/// - `initial_peer_target`: sessions launched in the initial burst,
/// - `active_peer_target`: active sessions the swarm tops up toward on each tick,
/// - `max_peer_target`: ceiling the target is raised toward when progress stalls,
#[derive(Debug, Clone)]
pub struct Cfg {
    pub tcp_port: u16,
    pub download_directory: String,
    pub connect_seconds_timeout: u64,
    pub read_seconds_timeout: u64,
    pub stall_receive_limit: u32,
    pub initial_peer_target: usize,
    pub active_peer_target: usize,
    pub max_peer_target: usize,
}

impl Cfg {
    /// Builds a Cfg struct containing the config file information by the given path.
    /// The format of the config file must be: {config_name}={config_value} (without brackets).
    /// In case of success it returns a Cfg struct.
    ///
    /// It returns an io::Error if:
    /// - The path to the config file does not exist or could not be open/readed.
    /// - The confing file has wrong format.
    /// - A wrong config_name was in the config file.
    /// - A numeric setting is not a valid number in the config file.
    /// - Minimum number of correct settings were not reached.
    pub fn new(path: &str) -> io::Result<Self> {
        let mut cfg = Self {
            tcp_port: 0,
            download_directory: String::from(""),
            connect_seconds_timeout: 0,
            read_seconds_timeout: 0,
            stall_receive_limit: 0,
            initial_peer_target: 0,
            active_peer_target: 0,
            max_peer_target: 0,
        };

        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut settings_loaded = 0;

        for line in reader.lines() {
            let current_line = line?;
            if current_line.is_empty() {
                continue;
            }
            let setting: Vec<&str> = current_line.split('=').collect();

            if setting.len() != 2 {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid config input: {}", current_line),
                ));
            }
            cfg = Self::load_setting(cfg, setting[0], setting[1])?;
            settings_loaded += 1;
        }
        if settings_loaded < constants::MIN_SETTINGS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Minimum number of correct settings were not reached: {}",
                    settings_loaded
                ),
            ));
        }
        Ok(cfg)
    }

    fn load_setting(mut self, name: &str, value: &str) -> io::Result<Self> {
        match name {
            constants::TCP_PORT => {
                self.tcp_port = self.parse_value(value, constants::TCP_PORT)?;
            }
            constants::DOWNLOAD_DIRECTORY => self.download_directory = String::from(value),

            constants::CONNECT_SECONDS_TIMEOUT => {
                self.connect_seconds_timeout =
                    self.parse_value(value, constants::CONNECT_SECONDS_TIMEOUT)?;
            }

            constants::READ_SECONDS_TIMEOUT => {
                self.read_seconds_timeout =
                    self.parse_value(value, constants::READ_SECONDS_TIMEOUT)?;
            }

            constants::STALL_RECEIVE_LIMIT => {
                self.stall_receive_limit =
                    self.parse_value(value, constants::STALL_RECEIVE_LIMIT)?;
            }

            constants::INITIAL_PEER_TARGET => {
                self.initial_peer_target =
                    self.parse_value(value, constants::INITIAL_PEER_TARGET)?;
            }

            constants::ACTIVE_PEER_TARGET => {
                self.active_peer_target = self.parse_value(value, constants::ACTIVE_PEER_TARGET)?;
            }

            constants::MAX_PEER_TARGET => {
                self.max_peer_target = self.parse_value(value, constants::MAX_PEER_TARGET)?;
            }

            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("Invalid config setting name: {}", name),
                ))
            }
        }
        Ok(self)
    }

    fn parse_value<F>(&self, value: &str, setting: &str) -> io::Result<F>
    where
        F: FromStr,
    {
        match value.parse::<F>() {
            Err(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "Invalid setting: {}, is not a valid type: {}",
                    setting, value
                ),
            )),
            Ok(parsed) => Ok(parsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Write};

    const GOOD_CONTENTS: &[u8] = b"TCP_PORT=6881\nDOWNLOAD_DIRECTORY=./downloads\nCONNECT_SECONDS_TIMEOUT=5\nREAD_SECONDS_TIMEOUT=5\nSTALL_RECEIVE_LIMIT=15\nINITIAL_PEER_TARGET=20\nACTIVE_PEER_TARGET=50\nMAX_PEER_TARGET=100";

    #[test]
    fn test_good_config() {
        let path = "./test_good_config.cfg";
        create_and_write_file(path, GOOD_CONTENTS);

        let config = Cfg::new(path).unwrap();

        assert_eq!(config.tcp_port, 6881);
        assert_eq!(config.download_directory, "./downloads");
        assert_eq!(config.connect_seconds_timeout, 5);
        assert_eq!(config.read_seconds_timeout, 5);
        assert_eq!(config.stall_receive_limit, 15);
        assert_eq!(config.initial_peer_target, 20);
        assert_eq!(config.active_peer_target, 50);
        assert_eq!(config.max_peer_target, 100);

        remove_file(path);
    }

    #[test]
    fn test_bad_path() {
        assert!(Cfg::new("bad path").is_err());
    }

    #[test]
    fn test_empty_file() {
        let path = "./test_empty_file.cfg";
        create_and_write_file(path, b"");

        create_and_assert_config_is_not_ok(path);
    }

    #[test]
    fn test_setting_doesnt_exist() {
        let path = "./test_setting_doesnt_exist.cfg";
        create_and_write_file(path, b"WRONG_SETTING=1000");

        create_and_assert_config_is_not_ok(path);
    }

    #[test]
    fn test_bad_number_of_settings() {
        let path = "./test_bad_number_of_settings.cfg";
        create_and_write_file(path, b"TCP_PORT=6881\nDOWNLOAD_DIRECTORY=./downloads");

        create_and_assert_config_is_not_ok(path);
    }

    #[test]
    fn test_tcp_port_not_a_number() {
        let path = "./test_tcp_port_not_a_number.cfg";
        let contents = b"TCP_PORT=abcd\nDOWNLOAD_DIRECTORY=./downloads\nCONNECT_SECONDS_TIMEOUT=5\nREAD_SECONDS_TIMEOUT=5\nSTALL_RECEIVE_LIMIT=15\nINITIAL_PEER_TARGET=20\nACTIVE_PEER_TARGET=50\nMAX_PEER_TARGET=100";
        create_and_write_file(path, contents);

        create_and_assert_config_is_not_ok(path);
    }

    #[test]
    fn test_stall_limit_not_a_number() {
        let path = "./test_stall_limit_not_a_number.cfg";
        let contents = b"TCP_PORT=6881\nDOWNLOAD_DIRECTORY=./downloads\nCONNECT_SECONDS_TIMEOUT=5\nREAD_SECONDS_TIMEOUT=5\nSTALL_RECEIVE_LIMIT=often\nINITIAL_PEER_TARGET=20\nACTIVE_PEER_TARGET=50\nMAX_PEER_TARGET=100";
        create_and_write_file(path, contents);

        create_and_assert_config_is_not_ok(path);
    }

    #[test]
    fn test_order_doesnt_matter() {
        let path = "./test_order_doesnt_matter.cfg";
        let contents = b"MAX_PEER_TARGET=40\nDOWNLOAD_DIRECTORY=./elsewhere\nTCP_PORT=2500\nREAD_SECONDS_TIMEOUT=10\nSTALL_RECEIVE_LIMIT=3\nINITIAL_PEER_TARGET=2\nACTIVE_PEER_TARGET=20\nCONNECT_SECONDS_TIMEOUT=1";
        create_and_write_file(path, contents);

        let config = Cfg::new(path).unwrap();

        assert_eq!(config.tcp_port, 2500);
        assert_eq!(config.download_directory, "./elsewhere");
        assert_eq!(config.connect_seconds_timeout, 1);
        assert_eq!(config.read_seconds_timeout, 10);
        assert_eq!(config.stall_receive_limit, 3);
        assert_eq!(config.initial_peer_target, 2);
        assert_eq!(config.active_peer_target, 20);
        assert_eq!(config.max_peer_target, 40);

        remove_file(path);
    }

    #[test]
    fn test_bad_format() {
        let path = "./test_bad_format.cfg";
        let contents = b"TCP_PORT=abcd=1234\nDOWNLOAD_DIRECTORY=./downloads\nCONNECT_SECONDS_TIMEOUT=5\nREAD_SECONDS_TIMEOUT=5\nSTALL_RECEIVE_LIMIT=15\nINITIAL_PEER_TARGET=20\nACTIVE_PEER_TARGET=50\nMAX_PEER_TARGET=100";
        create_and_write_file(path, contents);

        create_and_assert_config_is_not_ok(path);
    }

    // Auxiliary functions

    fn create_and_write_file(path: &str, contents: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(contents).unwrap();
    }

    fn remove_file(path: &str) {
        fs::remove_file(path).unwrap();
    }

    fn create_and_assert_config_is_not_ok(path: &str) {
        assert!(Cfg::new(path).is_err());
        remove_file(path);
    }
}
