use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{Html, Json},
    routing::{get, post},
    Form, Router,
};
use log::{info, warn};
use serde::Deserialize;

use crate::aave_client::ReserveSource;
use crate::error::QuoteError;
use crate::page::{IndexPage, QuoteView};
use crate::resolver::{
    build_reserve_request, display_chain_name, normalize_chain, normalize_symbol,
};
use crate::types::{Config, Result};
use crate::utils::format_percent;

const FALLBACK_TOKEN: &str = "USDC";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub source: Arc<dyn ReserveSource>,
}

/// `chain` / `token` from the query string or the submitted form.
#[derive(Debug, Default, Deserialize)]
pub struct Selection {
    pub chain: Option<String>,
    pub token: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AppState {
    fn symbols_for(&self, chain: &str) -> Vec<String> {
        self.config
            .markets
            .tokens
            .tokens(chain)
            .iter()
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    fn page(&self, chain: String, token: String) -> IndexPage {
        IndexPage {
            chains: self.config.markets.chains.names(),
            tokens: self.symbols_for(&chain),
            chain,
            token,
            result: None,
            error: None,
        }
    }

    /// Resolve, query upstream, compute. One attempt, nothing cached.
    async fn quote(&self, chain: &str, token: &str) -> std::result::Result<QuoteView, QuoteError> {
        let request = build_reserve_request(&self.config.markets, chain, token)?;
        let reserve = self.source.fetch_reserve(&request).await?;
        let rates = reserve.rates()?;

        Ok(QuoteView {
            chain: display_chain_name(chain),
            market: request.market,
            token: reserve.underlying_token.symbol,
            address: reserve.underlying_token.address,
            protocol_pct: format_percent(&rates.protocol_apy),
            incentive_pct: format_percent(&rates.incentive_apy),
            total_pct: format_percent(&rates.total_apy),
        })
    }
}

async fn index(State(state): State<AppState>, Query(selection): Query<Selection>) -> Html<String> {
    let chain = non_empty(selection.chain)
        .map(|c| normalize_chain(&c))
        .unwrap_or_else(|| state.config.default_chain.clone());

    let mut page = state.page(chain, String::new());
    page.token = non_empty(selection.token)
        .or_else(|| page.tokens.first().cloned())
        .map(|t| normalize_symbol(&t))
        .unwrap_or_else(|| FALLBACK_TOKEN.to_string());

    Html(page.render())
}

async fn fetch(State(state): State<AppState>, Form(selection): Form<Selection>) -> Html<String> {
    let chain = non_empty(selection.chain)
        .map(|c| normalize_chain(&c))
        .unwrap_or_else(|| state.config.default_chain.clone());
    let token = non_empty(selection.token)
        .map(|t| normalize_symbol(&t))
        .unwrap_or_else(|| FALLBACK_TOKEN.to_string());

    let page = match state.quote(&chain, &token).await {
        Ok(view) => {
            info!(
                "[WebServer::fetch] {} {} => protocol={} incentive={} net={}",
                chain, token, view.protocol_pct, view.incentive_pct, view.total_pct
            );
            let mut page = state.page(chain, token);
            page.result = Some(view);
            page
        }
        Err(err @ QuoteError::UnsupportedChain(_)) => {
            warn!("[WebServer::fetch] {}", err);
            // Fall back to the default chain's token list.
            let fallback = state.config.default_chain.clone();
            let mut page = state.page(fallback, String::new());
            page.token = page.tokens.first().cloned().unwrap_or_default();
            page.error = Some(err.to_string());
            page
        }
        Err(err) => {
            warn!("[WebServer::fetch] {} {}: {}", chain, token, err);
            let mut page = state.page(chain, token);
            page.error = Some(err.to_string());
            page
        }
    };

    Html(page.render())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub struct WebServer {
    config: Arc<Config>,
    source: Arc<dyn ReserveSource>,
}

impl WebServer {
    pub fn new(config: Arc<Config>, source: Arc<dyn ReserveSource>) -> Self {
        Self { config, source }
    }

    pub fn router(&self) -> Router {
        let state = AppState {
            config: self.config.clone(),
            source: self.source.clone(),
        };

        Router::new()
            .route("/", get(index))
            .route("/fetch", post(fetch))
            .route("/health", get(health))
            .with_state(state)
    }

    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(
            "[WebServer::run] Listening on http://{} ({} chains configured)",
            listener.local_addr()?,
            self.config.markets.chains.names().len()
        );

        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
