use log::warn;

use crate::error::QuoteError;
use crate::types::{MarketConfig, ReserveRequest};

/// Uppercase-keyed view of a chain's token table, built by `TokenConfig::new`.
///
/// Symbols that collide once uppercased (`usdc` / `USDC`) keep the first
/// entry in configuration order; later ones are dropped with a warning.
pub fn token_symbols(chain: &str, tokens: &[(String, String)]) -> Vec<(String, String)> {
    let mut view: Vec<(String, String)> = Vec::with_capacity(tokens.len());

    for (symbol, address) in tokens {
        let upper = symbol.trim().to_uppercase();
        if view.iter().any(|(existing, _)| *existing == upper) {
            warn!(
                "[resolver::token_symbols] {}: symbol {} collides with an earlier entry, ignoring {}",
                chain, symbol, address
            );
            continue;
        }
        view.push((upper, address.clone()));
    }

    view
}

pub fn normalize_chain(chain: &str) -> String {
    chain.trim().to_lowercase()
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Resolves a (chain, symbol) selection into the identifiers of the
/// `reserve` query. Nothing is sent upstream when this fails.
pub fn build_reserve_request(
    markets: &MarketConfig,
    chain: &str,
    symbol: &str,
) -> Result<ReserveRequest, QuoteError> {
    let chain = normalize_chain(chain);
    let symbol = normalize_symbol(symbol);

    let info = markets
        .chains
        .get(&chain)
        .ok_or_else(|| QuoteError::UnsupportedChain(chain.clone()))?;

    let address = markets
        .tokens
        .tokens(&chain)
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, address)| address)
        .ok_or_else(|| QuoteError::UnknownToken {
            chain: chain.clone(),
            symbol: symbol.clone(),
        })?;

    Ok(ReserveRequest {
        chain_id: info.chain_id,
        market: info.market.clone(),
        underlying_token: address.trim().to_lowercase(),
    })
}

/// `base` -> `Base`, `arbitrum one` -> `Arbitrum One`.
pub fn display_chain_name(chain: &str) -> String {
    let mut out = String::with_capacity(chain.len());
    let mut at_word_start = true;

    for c in chain.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }

    out
}
