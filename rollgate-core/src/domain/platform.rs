//! Platform domain types
//!
//! A `PlatformProfile` captures everything that differs between distribution
//! families (service name, config root, control binaries) so the rest of the
//! system never branches on the OS family again after startup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::command::CommandLine;
use super::environment::normalized;
use super::target::ServiceTarget;

/// Linux distribution family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Debian,
    Rhel,
    Fedora,
    Amazon,
    Suse,
    Arch,
    Other,
}

impl PlatformFamily {
    /// Maps `/etc/os-release` `ID` and `ID_LIKE` values to a family
    pub fn from_os_release(id: &str, id_like: &str) -> Self {
        let candidates = std::iter::once(id).chain(id_like.split_whitespace());

        for candidate in candidates {
            let family = match candidate.trim_matches('"').to_lowercase().as_str() {
                "debian" | "ubuntu" | "linuxmint" | "raspbian" => Some(Self::Debian),
                "rhel" | "centos" | "rocky" | "almalinux" | "ol" => Some(Self::Rhel),
                "fedora" => Some(Self::Fedora),
                "amzn" | "amazon" => Some(Self::Amazon),
                "suse" | "opensuse" | "opensuse-leap" | "opensuse-tumbleweed" | "sles" => {
                    Some(Self::Suse)
                }
                "arch" | "manjaro" => Some(Self::Arch),
                _ => None,
            };
            if let Some(family) = family {
                return family;
            }
        }

        Self::Other
    }

    /// Debian and SUSE ship the `apache2` layout, everything else `httpd`
    fn uses_apache2_layout(self) -> bool {
        matches!(self, Self::Debian | Self::Suse)
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debian => "debian",
            Self::Rhel => "rhel",
            Self::Fedora => "fedora",
            Self::Amazon => "amazon",
            Self::Suse => "suse",
            Self::Arch => "arch",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Process supervision style on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitSystem {
    Systemd,
    SysV,
}

/// How the syntax check is pointed at an alternate configuration root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltRootStyle {
    /// Export the given variable (e.g. `APACHE_CONFDIR`) set to the root
    EnvVar(String),
    /// Pass `-c "ServerRoot <root>"` to the check command
    ServerRootDirective,
}

/// Per-platform facts needed to drive the web server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformProfile {
    pub family: PlatformFamily,
    pub init: InitSystem,
    pub service_name: String,
    pub config_root: PathBuf,
    pub main_config: PathBuf,
    /// Control script used for syntax checks and sysv graceful reloads
    pub ctl_binary: String,
    /// Server binary, used for version queries
    pub server_binary: String,
    /// Pattern handed to `pgrep -f` to enumerate workers
    pub process_pattern: String,
    pub alt_root: AltRootStyle,
}

impl PlatformProfile {
    /// Builds the profile for a distribution family
    pub fn for_family(family: PlatformFamily, init: InitSystem) -> Self {
        if family.uses_apache2_layout() {
            let main_config = if family == PlatformFamily::Suse {
                "/etc/apache2/httpd.conf"
            } else {
                "/etc/apache2/apache2.conf"
            };
            let alt_root = if family == PlatformFamily::Debian {
                AltRootStyle::EnvVar("APACHE_CONFDIR".to_string())
            } else {
                AltRootStyle::ServerRootDirective
            };

            Self {
                family,
                init,
                service_name: "apache2".to_string(),
                config_root: PathBuf::from("/etc/apache2"),
                main_config: PathBuf::from(main_config),
                ctl_binary: if family == PlatformFamily::Debian {
                    "apache2ctl".to_string()
                } else {
                    "apachectl".to_string()
                },
                server_binary: "apache2".to_string(),
                process_pattern: "apache2".to_string(),
                alt_root,
            }
        } else {
            Self {
                family,
                init,
                service_name: "httpd".to_string(),
                config_root: PathBuf::from("/etc/httpd"),
                main_config: PathBuf::from("/etc/httpd/conf/httpd.conf"),
                ctl_binary: "apachectl".to_string(),
                server_binary: "httpd".to_string(),
                process_pattern: "httpd".to_string(),
                alt_root: AltRootStyle::ServerRootDirective,
            }
        }
    }

    /// Overrides the managed service name
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Overrides the canonical configuration root
    pub fn with_config_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config_root = normalized(root.into());
        self
    }

    /// Binary that performs the syntax check
    ///
    /// Debian's `apache2ctl` sources `envvars`, the `httpd` families call the
    /// server binary directly so `-c` directives are honoured.
    fn check_binary(&self) -> &str {
        match self.alt_root {
            AltRootStyle::EnvVar(_) => &self.ctl_binary,
            AltRootStyle::ServerRootDirective if self.family.uses_apache2_layout() => {
                &self.ctl_binary
            }
            AltRootStyle::ServerRootDirective => &self.server_binary,
        }
    }

    /// Derives the immutable service target the controller operates on
    pub fn service_target(&self) -> ServiceTarget {
        let service = self.service_name.as_str();

        let (reload, start, stop) = match self.init {
            InitSystem::Systemd => (
                CommandLine::new("systemctl").args(["reload", service]),
                CommandLine::new("systemctl").args(["start", service]),
                CommandLine::new("systemctl").args(["stop", service]),
            ),
            InitSystem::SysV => (
                CommandLine::new(self.ctl_binary.as_str()).arg("graceful"),
                CommandLine::new("service").args([service, "start"]),
                CommandLine::new("service").args([service, "stop"]),
            ),
        };

        ServiceTarget {
            name: self.service_name.clone(),
            validate: CommandLine::new(self.check_binary()).arg("-t"),
            alt_root: self.alt_root.clone(),
            reload,
            start,
            stop,
            status: vec![
                CommandLine::new("systemctl").args(["is-active", service]),
                CommandLine::new("service").args([service, "status"]),
            ],
            list_workers: CommandLine::new("pgrep").args(["-f", self.process_pattern.as_str()]),
            version: CommandLine::new(self.server_binary.as_str()).arg("-v"),
            process_pattern: self.process_pattern.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_os_release_id() {
        assert_eq!(PlatformFamily::from_os_release("ubuntu", ""), PlatformFamily::Debian);
        assert_eq!(PlatformFamily::from_os_release("fedora", ""), PlatformFamily::Fedora);
        assert_eq!(PlatformFamily::from_os_release("amzn", "\"centos rhel fedora\""), PlatformFamily::Amazon);
        assert_eq!(PlatformFamily::from_os_release("gentoo", ""), PlatformFamily::Other);
    }

    #[test]
    fn test_family_falls_back_to_id_like() {
        assert_eq!(
            PlatformFamily::from_os_release("pop", "ubuntu debian"),
            PlatformFamily::Debian
        );
        assert_eq!(
            PlatformFamily::from_os_release("\"rocky-custom\"", "\"rhel centos fedora\""),
            PlatformFamily::Rhel
        );
    }

    #[test]
    fn test_debian_profile() {
        let profile = PlatformProfile::for_family(PlatformFamily::Debian, InitSystem::Systemd);

        assert_eq!(profile.service_name, "apache2");
        assert_eq!(profile.config_root, PathBuf::from("/etc/apache2"));
        assert_eq!(profile.main_config, PathBuf::from("/etc/apache2/apache2.conf"));
        assert_eq!(profile.ctl_binary, "apache2ctl");
        assert_eq!(profile.alt_root, AltRootStyle::EnvVar("APACHE_CONFDIR".to_string()));
    }

    #[test]
    fn test_rhel_profile() {
        let profile = PlatformProfile::for_family(PlatformFamily::Rhel, InitSystem::Systemd);

        assert_eq!(profile.service_name, "httpd");
        assert_eq!(profile.config_root, PathBuf::from("/etc/httpd"));
        assert_eq!(profile.process_pattern, "httpd");
        assert_eq!(profile.alt_root, AltRootStyle::ServerRootDirective);
    }

    #[test]
    fn test_systemd_target_commands() {
        let target = PlatformProfile::for_family(PlatformFamily::Debian, InitSystem::Systemd)
            .service_target();

        assert_eq!(target.reload.to_string(), "systemctl reload apache2");
        assert_eq!(target.start.to_string(), "systemctl start apache2");
        assert_eq!(target.stop.to_string(), "systemctl stop apache2");
        assert_eq!(target.validate.to_string(), "apache2ctl -t");
        assert_eq!(target.list_workers.to_string(), "pgrep -f apache2");
    }

    #[test]
    fn test_sysv_target_uses_graceful() {
        let target =
            PlatformProfile::for_family(PlatformFamily::Rhel, InitSystem::SysV).service_target();

        assert_eq!(target.reload.to_string(), "apachectl graceful");
        assert_eq!(target.start.to_string(), "service httpd start");
        assert_eq!(target.validate.to_string(), "httpd -t");
        assert_eq!(target.version.to_string(), "httpd -v");
    }

    #[test]
    fn test_service_name_override_flows_into_target() {
        let target = PlatformProfile::for_family(PlatformFamily::Arch, InitSystem::Systemd)
            .with_service_name("httpd-edge")
            .service_target();

        assert_eq!(target.name, "httpd-edge");
        assert_eq!(target.reload.to_string(), "systemctl reload httpd-edge");
        assert_eq!(target.status[0].to_string(), "systemctl is-active httpd-edge");
        assert_eq!(target.status[1].to_string(), "service httpd-edge status");
    }

    #[test]
    fn test_config_root_override_drops_trailing_slash() {
        let profile = PlatformProfile::for_family(PlatformFamily::Debian, InitSystem::Systemd)
            .with_config_root("/srv/apache2/");

        assert_eq!(profile.config_root, PathBuf::from("/srv/apache2"));
    }
}
