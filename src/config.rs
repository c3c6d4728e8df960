//! Server configuration: read from environment variables, with no
//! config-file parser.

use std::env;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Disk,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub store: StoreBackend,
    pub store_dir: String,
    pub auth_enabled: bool,
    pub agent_identity_key: Option<String>,
    pub ledger_program_id: Option<String>,
    pub ledger_rpc_url: Option<String>,
    pub service_wallet_key: Option<String>,
    /// `None` means permissive (any origin), the documented default.
    /// `Some(origins)` restricts the CORS layer to exactly those.
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".parse().unwrap(),
            port: 41241,
            store: StoreBackend::Memory,
            store_dir: ".a2a-tasks".to_string(),
            auth_enabled: false,
            agent_identity_key: None,
            ledger_program_id: None,
            ledger_rpc_url: None,
            service_wallet_key: None,
            cors_allowed_origins: None,
        }
    }
}

impl ServerConfig {
    /// Build configuration from environment variables, falling back to
    /// the documented defaults for anything unset.
    pub fn from_env() -> Result<Self, String> {
        let mut config = ServerConfig::default();

        if let Ok(addr) = env::var("A2A_BIND_ADDR") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| format!("invalid A2A_BIND_ADDR {addr:?}: {e}"))?;
        }

        if let Ok(port) = env::var("A2A_PORT") {
            config.port = port
                .parse()
                .map_err(|e| format!("invalid A2A_PORT {port:?}: {e}"))?;
        }

        if let Ok(store) = env::var("A2A_STORE") {
            config.store = match store.as_str() {
                "memory" => StoreBackend::Memory,
                "disk" => StoreBackend::Disk,
                other => return Err(format!("invalid A2A_STORE {other:?}, expected memory or disk")),
            };
        }

        if let Ok(dir) = env::var("A2A_STORE_DIR") {
            config.store_dir = dir;
        }

        if let Ok(flag) = env::var("A2A_AUTH_ENABLED") {
            config.auth_enabled = matches!(flag.as_str(), "1" | "true" | "yes");
        }

        config.agent_identity_key = env::var("A2A_AGENT_IDENTITY_KEY").ok();
        config.ledger_program_id = env::var("A2A_LEDGER_PROGRAM_ID").ok();
        config.ledger_rpc_url = env::var("A2A_LEDGER_RPC_URL").ok();
        config.service_wallet_key = env::var("A2A_SERVICE_WALLET_KEY").ok();

        if let Ok(origins) = env::var("A2A_CORS_ALLOWED_ORIGINS") {
            config.cors_allowed_origins = Some(parse_cors_origins(&origins)?);
        }

        Ok(config)
    }
}

fn parse_cors_origins(raw: &str) -> Result<Vec<String>, String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if origins.is_empty() {
        return Err("A2A_CORS_ALLOWED_ORIGINS must not be empty if set".to_string());
    }
    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_port_and_memory_store() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 41241);
        assert_eq!(config.store, StoreBackend::Memory);
        assert!(!config.auth_enabled);
    }

    #[test]
    fn default_cors_is_permissive() {
        assert_eq!(ServerConfig::default().cors_allowed_origins, None);
    }

    #[test]
    fn cors_origins_are_split_and_trimmed() {
        let origins = parse_cors_origins(" https://a.test, https://b.test ,").unwrap();
        assert_eq!(origins, vec!["https://a.test", "https://b.test"]);
    }

    #[test]
    fn cors_origins_reject_empty_string() {
        assert!(parse_cors_origins("  ,  ,").is_err());
    }
}
