use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{QuoteError, UpstreamDataError};
use crate::types::{Config, ReserveQuote, ReserveRequest, Result};
use crate::utils::{compute_rates, parse_decimal};

/// Protocol borrow APY plus every borrow incentive of one reserve.
pub const RESERVE_QUERY: &str = r#"
query BorrowIncentives($request: ReserveRequest!) {
  reserve(request: $request) {
    underlyingToken { symbol address }
    borrowInfo { apy { value } }
    incentives {
      __typename
      ... on MeritBorrowIncentive {
        borrowAprDiscount { value }
      }
      ... on AaveBorrowIncentive {
        borrowAprDiscount { value }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ReserveData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct ReserveData {
    reserve: Option<Reserve>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reserve {
    pub underlying_token: UnderlyingToken,
    pub borrow_info: Option<BorrowInfo>,
    pub incentives: Option<Vec<Incentive>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnderlyingToken {
    pub symbol: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BorrowInfo {
    pub apy: DecimalValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecimalValue {
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incentive {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub borrow_apr_discount: Option<DecimalValue>,
}

impl Reserve {
    /// Supply-side incentive kinds carry no `borrowAprDiscount` and add nothing.
    pub fn rates(&self) -> std::result::Result<ReserveQuote, UpstreamDataError> {
        let borrow_info = self
            .borrow_info
            .as_ref()
            .ok_or(UpstreamDataError::MissingField("borrowInfo"))?;
        let protocol_apy = parse_decimal("borrowInfo.apy", &borrow_info.apy.value)?;

        let mut incentive_aprs = Vec::new();
        for incentive in self.incentives.iter().flatten() {
            match &incentive.borrow_apr_discount {
                Some(discount) => {
                    incentive_aprs.push(parse_decimal("borrowAprDiscount", &discount.value)?)
                }
                None => debug!(
                    "[Reserve::rates] Skipping {} without a borrow discount",
                    incentive.typename
                ),
            }
        }

        Ok(compute_rates(protocol_apy, &incentive_aprs))
    }
}

/// Where reserve data comes from. The web handlers only see this trait.
#[async_trait]
pub trait ReserveSource: Send + Sync {
    async fn fetch_reserve(
        &self,
        request: &ReserveRequest,
    ) -> std::result::Result<Reserve, QuoteError>;
}

pub struct AaveClient {
    http: reqwest::Client,
    endpoint: url::Url,
}

impl AaveClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        log::info!(
            "[AaveClient::new] GraphQL endpoint: {} (timeout {:?})",
            config.graphql_endpoint,
            config.request_timeout
        );

        Ok(Self {
            http,
            endpoint: config.graphql_endpoint.clone(),
        })
    }
}

#[async_trait]
impl ReserveSource for AaveClient {
    async fn fetch_reserve(
        &self,
        request: &ReserveRequest,
    ) -> std::result::Result<Reserve, QuoteError> {
        debug!(
            "[AaveClient::fetch_reserve] chainId={} market={} token={}",
            request.chain_id, request.market, request.underlying_token
        );

        let body = serde_json::json!({
            "query": RESERVE_QUERY,
            "variables": { "request": request },
        });

        // Single attempt; the client timeout bounds it.
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("[AaveClient::fetch_reserve] Request failed: {}", e);
                QuoteError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("[AaveClient::fetch_reserve] Aave API returned {}", status);
            return Err(QuoteError::UpstreamStatus(status.as_u16()));
        }

        let bytes = response.bytes().await?;
        let parsed: GraphqlResponse =
            serde_json::from_slice(&bytes).map_err(UpstreamDataError::from)?;

        match parsed.data.and_then(|d| d.reserve) {
            Some(reserve) => Ok(reserve),
            None => {
                let messages: Vec<String> = parsed
                    .errors
                    .unwrap_or_default()
                    .into_iter()
                    .map(|e| e.message)
                    .collect();

                if messages.is_empty() {
                    warn!("[AaveClient::fetch_reserve] No reserve in response");
                    Err(UpstreamDataError::MissingReserve.into())
                } else {
                    warn!("[AaveClient::fetch_reserve] GraphQL errors: {:?}", messages);
                    Err(UpstreamDataError::Graphql(messages.join("; ")).into())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MarketConfig;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use bigdecimal::{BigDecimal, Zero};
    use std::str::FromStr;
    use std::time::Duration;

    fn request() -> ReserveRequest {
        ReserveRequest {
            chain_id: 8453,
            market: "0xA238Dd80C259a72e81d7e4664a9801593F98d1c5".to_string(),
            underlying_token: "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913".to_string(),
        }
    }

    fn config_for(endpoint: url::Url, timeout: Duration) -> Config {
        Config {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            graphql_endpoint: endpoint,
            request_timeout: timeout,
            default_chain: "base".to_string(),
            markets: MarketConfig::default(),
        }
    }

    /// Serves `router` on an ephemeral port, standing in for the GraphQL API.
    async fn spawn_upstream(router: Router) -> url::Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        url::Url::parse(&format!("http://{}/graphql", addr)).unwrap()
    }

    async fn client_for(router: Router) -> AaveClient {
        let endpoint = spawn_upstream(router).await;
        AaveClient::new(&config_for(endpoint, Duration::from_secs(5))).unwrap()
    }

    fn reserve_json(token: &str) -> Value {
        serde_json::json!({
            "data": {
                "reserve": {
                    "underlyingToken": { "symbol": "USDC", "address": token },
                    "borrowInfo": { "apy": { "value": "0.08" } },
                    "incentives": [
                        { "__typename": "MeritBorrowIncentive", "borrowAprDiscount": { "value": "0.03" } },
                        { "__typename": "MeritSupplyIncentive" }
                    ]
                }
            }
        })
    }

    #[test]
    fn test_request_variables_shape() {
        let value = serde_json::to_value(request()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "chainId": 8453,
                "market": "0xA238Dd80C259a72e81d7e4664a9801593F98d1c5",
                "underlyingToken": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
            })
        );
    }

    #[test]
    fn test_reserve_rates_skip_non_borrow_incentives() {
        let parsed: GraphqlResponse = serde_json::from_value(reserve_json("0xabc")).unwrap();
        let reserve = parsed.data.unwrap().reserve.unwrap();

        let with_supply_incentive = reserve.rates().unwrap();
        let borrow_only = compute_rates(
            BigDecimal::from_str("0.08").unwrap(),
            &[BigDecimal::from_str("0.03").unwrap()],
        );
        assert_eq!(with_supply_incentive, borrow_only);
    }

    #[test]
    fn test_reserve_without_incentives() {
        let reserve: Reserve = serde_json::from_value(serde_json::json!({
            "underlyingToken": { "symbol": "WETH", "address": "0x42" },
            "borrowInfo": { "apy": { "value": 0.021 } },
            "incentives": null
        }))
        .unwrap();

        let quote = reserve.rates().unwrap();
        assert_eq!(quote.incentive_apy, BigDecimal::zero());
        assert_eq!(quote.total_apy, BigDecimal::from_str("0.021").unwrap());
    }

    #[test]
    fn test_reserve_without_borrow_info() {
        let reserve: Reserve = serde_json::from_value(serde_json::json!({
            "underlyingToken": { "symbol": "GHO", "address": "0x40" },
            "borrowInfo": null,
            "incentives": []
        }))
        .unwrap();

        assert!(matches!(
            reserve.rates(),
            Err(UpstreamDataError::MissingField("borrowInfo"))
        ));
    }

    #[test]
    fn test_reserve_with_malformed_apy() {
        let reserve: Reserve = serde_json::from_value(serde_json::json!({
            "underlyingToken": { "symbol": "USDC", "address": "0x83" },
            "borrowInfo": { "apy": { "value": "five percent" } },
            "incentives": []
        }))
        .unwrap();

        assert!(matches!(
            reserve.rates(),
            Err(UpstreamDataError::InvalidDecimal { field: "borrowInfo.apy", .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_reserve_success() {
        // Echo the requested token back so the variables are checked end to end.
        let router = Router::new().route(
            "/graphql",
            post(|Json(body): Json<Value>| async move {
                let token = body["variables"]["request"]["underlyingToken"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                Json(reserve_json(&token))
            }),
        );
        let client = client_for(router).await;

        let reserve = client.fetch_reserve(&request()).await.unwrap();
        assert_eq!(reserve.underlying_token.symbol, "USDC");
        assert_eq!(
            reserve.underlying_token.address,
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
    }

    #[tokio::test]
    async fn test_fetch_reserve_non_success_status() {
        let router = Router::new().route(
            "/graphql",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let client = client_for(router).await;

        let err = client.fetch_reserve(&request()).await.unwrap_err();
        assert!(matches!(err, QuoteError::UpstreamStatus(502)));
        assert_eq!(err.to_string(), "Aave API error 502");
    }

    #[tokio::test]
    async fn test_fetch_reserve_missing_reserve() {
        let router = Router::new().route(
            "/graphql",
            post(|| async { Json(serde_json::json!({ "data": { "reserve": null } })) }),
        );
        let client = client_for(router).await;

        let err = client.fetch_reserve(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            QuoteError::UpstreamData(UpstreamDataError::MissingReserve)
        ));
        assert_eq!(err.to_string(), "No reserve data");
    }

    #[tokio::test]
    async fn test_fetch_reserve_graphql_errors() {
        let router = Router::new().route(
            "/graphql",
            post(|| async {
                Json(serde_json::json!({
                    "data": null,
                    "errors": [{ "message": "Market not found" }]
                }))
            }),
        );
        let client = client_for(router).await;

        let err = client.fetch_reserve(&request()).await.unwrap_err();
        match err {
            QuoteError::UpstreamData(UpstreamDataError::Graphql(msg)) => {
                assert_eq!(msg, "Market not found")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_reserve_invalid_body() {
        let router = Router::new().route("/graphql", post(|| async { "<html>oops</html>" }));
        let client = client_for(router).await;

        let err = client.fetch_reserve(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            QuoteError::UpstreamData(UpstreamDataError::InvalidBody(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_reserve_times_out() {
        let router = Router::new().route(
            "/graphql",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({}))
            }),
        );
        let endpoint = spawn_upstream(router).await;
        let client =
            AaveClient::new(&config_for(endpoint, Duration::from_millis(200))).unwrap();

        let err = client.fetch_reserve(&request()).await.unwrap_err();
        match err {
            QuoteError::UpstreamRequest(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
