use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use log::LevelFilter;

use crate::relay::RelayMode;

/// Signaling relay brokering offer/answer/candidate exchange between peers.
#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "PEER_SIGNAL_ADDRESS", default_value = "127.0.0.1:9001")]
    pub address: SocketAddr,

    /// Recipient selection: every other peer, or a strict pair
    #[arg(long, env = "PEER_SIGNAL_MODE", value_enum, default_value_t = RelayMode::Broadcast)]
    pub mode: RelayMode,

    /// Close connections that send nothing for this many seconds
    #[arg(long, env = "PEER_SIGNAL_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// One of off, error, warn, info, debug, trace
    #[arg(long, env = "PEER_SIGNAL_LOG_LEVEL", default_value_t = LevelFilter::Info)]
    pub log_level: LevelFilter,
}

impl Config {
    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["peer-signal-server"]).unwrap();
        assert_eq!(config.address, "127.0.0.1:9001".parse().unwrap());
        assert_eq!(config.mode, RelayMode::Broadcast);
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.log_level, LevelFilter::Info);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "peer-signal-server",
            "--address",
            "0.0.0.0:8443",
            "--mode",
            "targeted",
            "--idle-timeout-secs",
            "90",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(config.address.port(), 8443);
        assert_eq!(config.mode, RelayMode::Targeted);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.log_level, LevelFilter::Debug);
    }

    #[test]
    fn zero_idle_timeout_means_none() {
        let config =
            Config::try_parse_from(["peer-signal-server", "--idle-timeout-secs", "0"]).unwrap();
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Config::try_parse_from(["peer-signal-server", "--mode", "mesh"]).is_err());
    }
}
