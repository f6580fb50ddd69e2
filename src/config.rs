use std::net::SocketAddr;
use std::time::Duration;

use log::warn;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::types::{ChainConfig, ChainInfo, Config, MarketConfig, TokenConfig};

pub const CHAINS_VAR: &str = "CHAINS_ADDRESS_AND_CHAINID";
pub const TOKENS_VAR: &str = "TOKENS_JSON";
pub const ENDPOINT_VAR: &str = "AAVE_GRAPHQL_URL";
pub const BIND_ADDR_VAR: &str = "BIND_ADDR";
pub const TIMEOUT_VAR: &str = "REQUEST_TIMEOUT_SECS";
pub const DEFAULT_CHAIN_VAR: &str = "DEFAULT_CHAIN";

pub const DEFAULT_ENDPOINT: &str = "https://api.v3.aave.com/graphql";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CHAIN: &str = "base";

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            log::info!("[Config::from_env] Loaded variables from .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let chains_raw = lookup(CHAINS_VAR).ok_or(ConfigError::MissingVar(CHAINS_VAR))?;
        let tokens_raw = lookup(TOKENS_VAR).ok_or(ConfigError::MissingVar(TOKENS_VAR))?;

        let markets = MarketConfig {
            chains: parse_chains(&chains_raw)?,
            tokens: parse_tokens(&tokens_raw)?,
        };

        let endpoint_raw = lookup(ENDPOINT_VAR).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let graphql_endpoint =
            url::Url::parse(&endpoint_raw).map_err(|_| ConfigError::InvalidValue {
                var: ENDPOINT_VAR,
                value: endpoint_raw.clone(),
            })?;

        let bind_raw = lookup(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                var: BIND_ADDR_VAR,
                value: bind_raw.clone(),
            })?;

        let request_timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: TIMEOUT_VAR,
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let default_chain = lookup(DEFAULT_CHAIN_VAR)
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CHAIN.to_string());

        if !markets.chains.contains(&default_chain) {
            warn!(
                "[Config::from_lookup] Default chain {} is not configured",
                default_chain
            );
        }

        Ok(Self {
            bind_addr,
            graphql_endpoint,
            request_timeout,
            default_chain,
            markets,
        })
    }
}

fn parse_object(var: &'static str, raw: &str) -> Result<Map<String, Value>, ConfigError> {
    serde_json::from_str(raw).map_err(|source| ConfigError::InvalidJson { var, source })
}

/// Chain keys are lowercased; on a case collision the first entry is kept.
fn parse_chains(raw: &str) -> Result<ChainConfig, ConfigError> {
    let mut entries: Vec<(String, ChainInfo)> = Vec::new();

    for (name, value) in parse_object(CHAINS_VAR, raw)? {
        let info: ChainInfo = serde_json::from_value(value)
            .map_err(|source| ConfigError::InvalidJson { var: CHAINS_VAR, source })?;
        let key = name.trim().to_lowercase();

        if entries.iter().any(|(existing, _)| *existing == key) {
            warn!("[Config] Duplicate chain {} in {}, keeping the first", name, CHAINS_VAR);
            continue;
        }
        entries.push((key, info));
    }

    Ok(ChainConfig::new(entries))
}

/// Symbol case is normalised by `TokenConfig::new`.
fn parse_tokens(raw: &str) -> Result<TokenConfig, ConfigError> {
    let mut entries: Vec<(String, Vec<(String, String)>)> = Vec::new();

    for (name, value) in parse_object(TOKENS_VAR, raw)? {
        let key = name.trim().to_lowercase();
        let table = match value {
            Value::Object(table) => table,
            other => {
                return Err(ConfigError::InvalidValue {
                    var: TOKENS_VAR,
                    value: other.to_string(),
                })
            }
        };

        let mut tokens = Vec::with_capacity(table.len());
        for (symbol, address) in table {
            match address {
                Value::String(address) => tokens.push((symbol, address)),
                _ => {
                    return Err(ConfigError::InvalidTokenAddress {
                        chain: key,
                        symbol,
                    })
                }
            }
        }

        if entries.iter().any(|(existing, _)| *existing == key) {
            warn!("[Config] Duplicate chain {} in {}, keeping the first", name, TOKENS_VAR);
            continue;
        }
        entries.push((key, tokens));
    }

    Ok(TokenConfig::new(entries))
}
