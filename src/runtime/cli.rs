use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::runtime::serde_level;

#[derive(Parser, Debug, Serialize, Deserialize)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set the path to the configuration file (e.g., "broker.yaml").
    #[arg(short, long, value_name = "FILE", env = "NETWORK_BROKER_CONFIG_PATH")]
    pub config: Option<PathBuf>,

    /// Set the application's log level (e.g., "debug", "warn").
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        env = "NETWORK_BROKER_LOG_LEVEL",
        default_value = "info"
    )]
    #[serde(with = "serde_level")]
    pub log_level: Level,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser as _;
    use figment::Jail;
    use serial_test::serial;
    use tracing::Level;

    use super::Cli;

    #[test]
    #[serial]
    fn parses_long_flags() {
        Jail::expect_with(|jail| {
            jail.set_env("NETWORK_BROKER_CONFIG_PATH", "/tmp/broker.yaml");
            jail.set_env("NETWORK_BROKER_LOG_LEVEL", "debug");

            let args = [
                "network-broker",
                "--config",
                "/path/to/broker.yaml",
                "--log-level",
                "warn",
            ];
            let cli = Cli::parse_from(args);
            assert_eq!(cli.config, Some(PathBuf::from("/path/to/broker.yaml")));
            assert_eq!(cli.log_level, Level::WARN);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn parses_from_env_when_no_args() {
        Jail::expect_with(|jail| {
            jail.set_env("NETWORK_BROKER_CONFIG_PATH", "/tmp/broker.yaml");
            jail.set_env("NETWORK_BROKER_LOG_LEVEL", "debug");

            let cli = Cli::parse_from(["network-broker"]);
            assert_eq!(cli.config, Some(PathBuf::from("/tmp/broker.yaml")));
            assert_eq!(cli.log_level, Level::DEBUG);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn default_log_level_is_info() {
        Jail::expect_with(|_jail| {
            let cli = Cli::parse_from(["network-broker"]);
            assert_eq!(cli.log_level, Level::INFO);
            Ok(())
        });
    }
}
