//! CLI argument definitions for sbomer-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use sbomer_core::config::SbomerConfig;

/// SBOMer orchestration daemon.
///
/// Runs the resolution, generation, reconciliation and scheduling
/// components, and takes part in leader election with other replicas.
#[derive(Parser, Debug)]
#[command(name = "sbomer-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to sbomer.toml configuration file.
    #[arg(short, long, default_value = "/etc/sbomer/sbomer.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override the instance identity used as lease holder.
    #[arg(long)]
    pub identity: Option<String>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut SbomerConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
        if let Some(identity) = &self.identity {
            config.general.identity.clone_from(identity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_system_config() {
        let cli = DaemonCli::parse_from(["sbomer-daemon"]);
        assert_eq!(cli.config, PathBuf::from("/etc/sbomer/sbomer.toml"));
        assert!(!cli.validate);
        assert!(cli.identity.is_none());
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = DaemonCli::parse_from([
            "sbomer-daemon",
            "--config",
            "sbomer.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--identity",
            "replica-2",
            "--validate",
        ]);
        let mut config = SbomerConfig::default();
        cli.apply_overrides(&mut config);

        assert!(cli.validate);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_format, "pretty");
        assert_eq!(config.general.identity, "replica-2");
    }
}
