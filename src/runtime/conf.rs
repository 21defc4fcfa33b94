use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::runtime::{cli::Cli, serde_level};

/// Route installation behavior for links that reach the `routable`
/// operational state.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConf {
    /// Resolve the link's IPv4 gateway and install a default route once the
    /// link becomes routable.
    pub install_on_routable: bool,
    /// Routing table the installed route goes into.
    pub table: u32,
}

impl Default for RouteConf {
    fn default() -> Self {
        Self {
            install_on_routable: false,
            // RT_TABLE_MAIN
            table: 254,
        }
    }
}

/// Broker configuration, merged from defaults, an optional YAML file,
/// environment variables, and CLI arguments (in that priority order).
#[derive(Debug, Deserialize, Serialize)]
pub struct Conf {
    /// Root directory holding the `<state>.d` hook directories and the
    /// fixed `manager.d` directory.
    #[serde(default = "defaults::hook_root")]
    pub hook_root: PathBuf,

    /// Directory holding per-interface DHCP lease files, keyed by ifindex.
    #[serde(default = "defaults::lease_dir")]
    pub lease_dir: PathBuf,

    /// Source path of the loaded configuration file, kept for diagnostics.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// The logging level for the application.
    #[serde(with = "serde_level")]
    pub log_level: Level,

    /// Capacity of the D-Bus signal buffer.
    #[serde(default = "defaults::channel_capacity")]
    pub channel_capacity: usize,

    /// Route installation settings.
    #[serde(default)]
    pub routes: RouteConf,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            hook_root: defaults::hook_root(),
            lease_dir: defaults::lease_dir(),
            config_path: None,
            log_level: Level::INFO,
            channel_capacity: defaults::channel_capacity(),
            routes: RouteConf::default(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn hook_root() -> PathBuf {
        PathBuf::from("/etc/network-broker")
    }

    pub fn lease_dir() -> PathBuf {
        PathBuf::from("/run/systemd/netif/leases")
    }

    pub fn channel_capacity() -> usize {
        512
    }
}

impl Conf {
    /// Creates a new `Conf` from the provided CLI arguments and optional
    /// configuration file. Priority order:
    /// Defaults < Configuration File < Environment Variables < CLI Arguments.
    pub fn new(cli: Cli) -> Result<(Self, Cli), ConfError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Conf::default()));

        let config_path_to_store = if let Some(config_path) = &cli.config {
            validate_config_path(config_path)?;
            figment = figment.merge(Yaml::file(config_path));
            Some(config_path.clone())
        } else {
            None
        };

        figment = figment.merge(Serialized::defaults(&cli));

        let mut conf: Conf = figment.extract()?;

        conf.config_path = config_path_to_store;
        Ok((conf, cli))
    }
}

/// Validates that the given path points to an existing file with a supported
/// extension.
fn validate_config_path(path: &Path) -> Result<(), ConfError> {
    if !path.is_file() {
        if path.exists() {
            return Err(ConfError::InvalidConfigPath(
                path.to_string_lossy().into_owned(),
            ));
        } else {
            return Err(ConfError::NoConfigFile);
        }
    }

    match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => Ok(()),
        Some(ext) => Err(ConfError::InvalidExtension(ext.to_string())),
        None => Err(ConfError::InvalidExtension("none".to_string())),
    }
}

#[derive(Debug)]
pub enum ConfError {
    /// The specified configuration file does not exist.
    NoConfigFile,
    /// The path exists but is not a file (e.g., it's a directory).
    InvalidConfigPath(String),
    /// The file has an unsupported extension.
    InvalidExtension(String),
    /// Failed to extract configuration data.
    Extraction(Box<figment::Error>),
}

impl fmt::Display for ConfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfError::NoConfigFile => write!(f, "no config file provided"),
            ConfError::InvalidConfigPath(p) => write!(f, "path '{p}' is not a valid file"),
            ConfError::InvalidExtension(ext) => {
                write!(f, "invalid file extension '.{ext}', expected 'yaml' or 'yml'")
            }
            ConfError::Extraction(e) => write!(f, "configuration error: {e}"),
        }
    }
}

impl Error for ConfError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfError::Extraction(e) => Some(e),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfError {
    fn from(e: figment::Error) -> Self {
        ConfError::Extraction(Box::from(e))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser as _;
    use figment::Jail;
    use serial_test::serial;
    use tracing::Level;

    use super::{Conf, ConfError};
    use crate::runtime::cli::Cli;

    #[test]
    #[serial]
    fn defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let cli = Cli::parse_from(["network-broker"]);
            let (conf, _cli) = Conf::new(cli).expect("conf");

            assert_eq!(conf.hook_root, PathBuf::from("/etc/network-broker"));
            assert_eq!(conf.lease_dir, PathBuf::from("/run/systemd/netif/leases"));
            assert_eq!(conf.log_level, Level::INFO);
            assert_eq!(conf.channel_capacity, 512);
            assert!(!conf.routes.install_on_routable);
            assert_eq!(conf.routes.table, 254);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn yaml_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "broker.yaml",
                r#"
                hook_root: /etc/hooks
                lease_dir: /tmp/leases
                channel_capacity: 64
                routes:
                  install_on_routable: true
                  table: 100
                "#,
            )?;

            let cli = Cli::parse_from(["network-broker", "--config", "broker.yaml"]);
            let (conf, _cli) = Conf::new(cli).expect("conf");

            assert_eq!(conf.hook_root, PathBuf::from("/etc/hooks"));
            assert_eq!(conf.lease_dir, PathBuf::from("/tmp/leases"));
            assert_eq!(conf.channel_capacity, 64);
            assert!(conf.routes.install_on_routable);
            assert_eq!(conf.routes.table, 100);
            assert_eq!(conf.config_path, Some(PathBuf::from("broker.yaml")));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn cli_overrides_yaml_log_level() {
        Jail::expect_with(|jail| {
            jail.create_file("broker.yaml", "log_level: warn")?;

            let cli = Cli::parse_from([
                "network-broker",
                "--config",
                "broker.yaml",
                "--log-level",
                "trace",
            ]);
            let (conf, _cli) = Conf::new(cli).expect("conf");

            assert_eq!(conf.log_level, Level::TRACE);
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn missing_config_file_is_an_error() {
        Jail::expect_with(|_jail| {
            let cli = Cli::parse_from(["network-broker", "--config", "nope.yaml"]);
            match Conf::new(cli) {
                Err(ConfError::NoConfigFile) => Ok(()),
                other => panic!("expected NoConfigFile, got {other:?}"),
            }
        });
    }

    #[test]
    #[serial]
    fn rejects_unsupported_extension() {
        Jail::expect_with(|jail| {
            jail.create_file("broker.toml", "hook_root = '/etc/hooks'")?;

            let cli = Cli::parse_from(["network-broker", "--config", "broker.toml"]);
            match Conf::new(cli) {
                Err(ConfError::InvalidExtension(ext)) => {
                    assert_eq!(ext, "toml");
                    Ok(())
                }
                other => panic!("expected InvalidExtension, got {other:?}"),
            }
        });
    }
}
