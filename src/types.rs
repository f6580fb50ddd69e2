use std::net::SocketAddr;
use std::time::Duration;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::resolver::token_symbols;

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;
pub type Result<T> = std::result::Result<T, DynError>;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub graphql_endpoint: url::Url,
    pub request_timeout: Duration,
    pub default_chain: String,
    pub markets: MarketConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: u64,
    pub market: String,
}

/// Chain name -> deployment, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    entries: Vec<(String, ChainInfo)>,
}

impl ChainConfig {
    pub fn new(entries: Vec<(String, ChainInfo)>) -> Self {
        Self { entries }
    }

    pub fn get(&self, chain: &str) -> Option<&ChainInfo> {
        self.entries
            .iter()
            .find(|(name, _)| name == chain)
            .map(|(_, info)| info)
    }

    pub fn contains(&self, chain: &str) -> bool {
        self.get(chain).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Chain name -> (SYMBOL, token address) pairs, in configuration order.
/// Symbols are uppercased once, when the table is built.
#[derive(Debug, Clone, Default)]
pub struct TokenConfig {
    entries: Vec<(String, Vec<(String, String)>)>,
}

impl TokenConfig {
    pub fn new(entries: Vec<(String, Vec<(String, String)>)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(chain, tokens)| {
                let view = token_symbols(&chain, &tokens);
                (chain, view)
            })
            .collect();
        Self { entries }
    }

    pub fn tokens(&self, chain: &str) -> &[(String, String)] {
        self.entries
            .iter()
            .find(|(name, _)| name == chain)
            .map(|(_, tokens)| tokens.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketConfig {
    pub chains: ChainConfig,
    pub tokens: TokenConfig,
}

/// Variables of the `reserve(request:)` GraphQL field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    pub chain_id: u64,
    pub market: String,
    pub underlying_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReserveQuote {
    pub protocol_apy: BigDecimal,
    pub incentive_apy: BigDecimal,
    pub total_apy: BigDecimal,
}
