//! Runtime configuration resolved from CLI flags and environment
//! variables, in the style of the teacher's `src/config.rs` `Config`
//! struct — except ported onto `clap` v4 derive instead of the
//! teacher's `clap` 2.x `Clap` derive.

use std::path::PathBuf;

use clap::Args;
use log::LevelFilter;

const DEFAULT_CNI_BIN_DIR: &str = "/opt/cni/bin";
const DEFAULT_CNI_CONF_DIR: &str = "/opt/cni/net.d";
const DEFAULT_CNI_CACHE_DIR: &str = "/opt/cni/cache";
const DEFAULT_INIT_REALM: &str = "main";
const DEFAULT_INIT_SPACE: &str = "default";

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Root of the persisted metadata tree.
    #[arg(long, env = "KUKE_RUN_PATH")]
    pub run_path: PathBuf,

    /// Unix domain socket path for the container daemon.
    #[arg(long, env = "KUKE_DAEMON_SOCKET")]
    pub daemon_socket: String,

    #[arg(long, env = "KUKE_CNI_BIN_DIR", default_value = DEFAULT_CNI_BIN_DIR)]
    pub cni_bin_dir: PathBuf,
    #[arg(long, env = "KUKE_CNI_CONF_DIR", default_value = DEFAULT_CNI_CONF_DIR)]
    pub cni_conf_dir: PathBuf,
    #[arg(long, env = "KUKE_CNI_CACHE_DIR", default_value = DEFAULT_CNI_CACHE_DIR)]
    pub cni_cache_dir: PathBuf,

    /// Default realm name used by `init` when none is given.
    #[arg(long, env = "KUKE_INIT_REALM", default_value = DEFAULT_INIT_REALM)]
    pub init_realm: String,
    /// Default space name used by `init` when none is given.
    #[arg(long, env = "KUKE_INIT_SPACE", default_value = DEFAULT_INIT_SPACE)]
    pub init_space: String,

    #[arg(
        long,
        short = 'l',
        env = "KUKE_LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error", "off"]
    )]
    pub log_level: String,
}

impl Config {
    pub fn log_level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_filter_falls_back_to_info_on_bogus_value() {
        let config = Config {
            run_path: PathBuf::from("/tmp/kuke"),
            daemon_socket: "/tmp/kuke.sock".into(),
            cni_bin_dir: PathBuf::from(DEFAULT_CNI_BIN_DIR),
            cni_conf_dir: PathBuf::from(DEFAULT_CNI_CONF_DIR),
            cni_cache_dir: PathBuf::from(DEFAULT_CNI_CACHE_DIR),
            init_realm: DEFAULT_INIT_REALM.into(),
            init_space: DEFAULT_INIT_SPACE.into(),
            log_level: "not-a-level".into(),
        };
        assert_eq!(config.log_level_filter(), LevelFilter::Info);
    }
}
