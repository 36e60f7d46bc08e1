//! Client for the remote gift card service.
//!
//! Wraps the three operations the settlement flow needs: lookup by code,
//! debit (redeem) and credit (void). Each call is a single outbound HTTP
//! request; retry policy belongs to callers. The service's loosely specified
//! response shapes are normalized here so the rest of the crate sees one
//! typed contract.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{GiftCard, GiftCardTransaction, SourceInfo, TransactionKind};

const ACCOUNT_ID_HEADER: &str = "x-account-id";
const API_VERSION_HEADER: &str = "x-api-version";

/// Connection settings for the gift card service.
#[derive(Clone, Debug)]
pub struct GiftCardApiConfig {
    /// Base URL up to and including the `/gift-cards` collection segment.
    pub base_url: String,
    pub api_token: String,
    pub account_id: String,
    pub api_version: String,
    pub request_timeout: Duration,
}

impl GiftCardApiConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.gift_card_api_base_url.trim_end_matches('/').to_string(),
            api_token: config.gift_card_api_token.clone(),
            account_id: config.gift_card_account_id.clone(),
            api_version: config.gift_card_api_version.clone(),
            request_timeout: Duration::from_secs(config.gift_card_request_timeout_secs),
        }
    }
}

/// Parameters for a balance decrease (redeem).
#[derive(Clone, Debug)]
pub struct DebitRequest {
    pub gift_card_id: String,
    pub amount: Decimal,
    pub idempotency_key: String,
    pub source_info: SourceInfo,
    pub redeem_options: RedeemOptions,
}

#[derive(Clone, Debug)]
pub struct RedeemOptions {
    pub order_id: String,
    pub liability: bool,
    pub total_price: Decimal,
    pub order_number: Option<String>,
}

/// Parameters for a balance increase (void of a prior redeem).
#[derive(Clone, Debug)]
pub struct CreditRequest {
    pub gift_card_id: String,
    pub amount: Decimal,
    pub idempotency_key: String,
    pub source_info: SourceInfo,
    pub void_options: VoidOptions,
}

#[derive(Clone, Debug)]
pub struct VoidOptions {
    /// Id of the redeem transaction being reversed. A void must reference
    /// what it is voiding.
    pub transaction_id: String,
}

#[derive(Clone)]
pub struct GiftCardService {
    client: Client,
    config: GiftCardApiConfig,
}

impl GiftCardService {
    /// Builds a service with a dedicated client carrying the credential
    /// headers on every request.
    pub fn new(config: GiftCardApiConfig) -> Result<Self, ServiceError> {
        let mut headers = HeaderMap::new();

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_token))
            .map_err(|_| {
                ServiceError::InvalidInput("Gift card API token is not a valid header value".into())
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        headers.insert(
            ACCOUNT_ID_HEADER,
            HeaderValue::from_str(&config.account_id).map_err(|_| {
                ServiceError::InvalidInput(
                    "Gift card account id is not a valid header value".into(),
                )
            })?,
        );
        headers.insert(
            API_VERSION_HEADER,
            HeaderValue::from_str(&config.api_version).map_err(|_| {
                ServiceError::InvalidInput(
                    "Gift card API version is not a valid header value".into(),
                )
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| {
                ServiceError::InternalError(format!(
                    "failed to construct gift card service client: {}",
                    err
                ))
            })?;

        Ok(Self { client, config })
    }

    /// Builds a service from an existing client (useful for testing).
    pub fn with_client(config: GiftCardApiConfig, client: Client) -> Self {
        Self { client, config }
    }

    /// Looks up a gift card by its code.
    ///
    /// Returns `NotFound` when the service reports zero records for the code.
    #[instrument(skip(self))]
    pub async fn lookup(&self, code: &str) -> Result<GiftCard, ServiceError> {
        let url = format!("{}/query", self.config.base_url);
        let body = QueryBody {
            query: QueryFilter {
                filter: CodeFilter { code },
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ServiceError::GiftCardServiceError(error_text(
                status.as_u16(),
                &bytes,
            )));
        }

        let payload: QueryPayload = serde_json::from_slice(&bytes).map_err(|err| {
            ServiceError::GiftCardServiceError(format!("unexpected query response shape: {}", err))
        })?;

        match payload.into_first_record() {
            Some(card) if !card.code.trim().is_empty() => Ok(card),
            _ => Err(ServiceError::NotFound("Gift card not found".to_string())),
        }
    }

    /// Decreases a gift card balance (redeem).
    #[instrument(skip(self, request), fields(gift_card_id = %request.gift_card_id, amount = %request.amount))]
    pub async fn debit(&self, request: DebitRequest) -> Result<GiftCardTransaction, ServiceError> {
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Debit amount must be greater than zero".to_string(),
            ));
        }
        check_idempotency_key(&request.idempotency_key)?;

        let url = format!(
            "{}/{}/decrease",
            self.config.base_url, request.gift_card_id
        );
        let body = TransactionEnvelope {
            transaction: TransactionWire {
                kind: TransactionKind::Redeem,
                gift_card_id: &request.gift_card_id,
                amount: request.amount.to_string(),
                idempotency_key: &request.idempotency_key,
                source_info: &request.source_info,
                redeem_options: Some(RedeemOptionsWire {
                    order_id: &request.redeem_options.order_id,
                    liability: request.redeem_options.liability,
                    total_price: request.redeem_options.total_price.to_string(),
                    order_number: request.redeem_options.order_number.as_deref(),
                }),
                void_options: None,
            },
        };

        let transaction_id = self.post_transaction(&url, &body).await?;
        Ok(GiftCardTransaction {
            transaction_id,
            kind: TransactionKind::Redeem,
            idempotency_key: request.idempotency_key,
            amount: request.amount,
        })
    }

    /// Increases a gift card balance, reversing the referenced redeem.
    #[instrument(skip(self, request), fields(gift_card_id = %request.gift_card_id, amount = %request.amount))]
    pub async fn credit(
        &self,
        request: CreditRequest,
    ) -> Result<GiftCardTransaction, ServiceError> {
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "Credit amount must be greater than zero".to_string(),
            ));
        }
        check_idempotency_key(&request.idempotency_key)?;
        if request.void_options.transaction_id.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "Transaction ID is required for void operations".to_string(),
            ));
        }

        let url = format!(
            "{}/{}/increase",
            self.config.base_url, request.gift_card_id
        );
        let body = TransactionEnvelope {
            transaction: TransactionWire {
                kind: TransactionKind::Void,
                gift_card_id: &request.gift_card_id,
                amount: request.amount.to_string(),
                idempotency_key: &request.idempotency_key,
                source_info: &request.source_info,
                redeem_options: None,
                void_options: Some(VoidOptionsWire {
                    transaction_id: &request.void_options.transaction_id,
                }),
            },
        };

        let transaction_id = self.post_transaction(&url, &body).await?;
        Ok(GiftCardTransaction {
            transaction_id,
            kind: TransactionKind::Void,
            idempotency_key: request.idempotency_key,
            amount: request.amount,
        })
    }

    /// Posts a balance mutation and extracts the transaction id.
    ///
    /// A 2xx response without a transaction id is treated as a failure: the
    /// id is the only handle for correlating (and voiding) the mutation.
    async fn post_transaction(
        &self,
        url: &str,
        body: &TransactionEnvelope<'_>,
    ) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(ServiceError::GiftCardServiceError(error_text(
                status.as_u16(),
                &bytes,
            )));
        }

        let payload: TransactionResponse = serde_json::from_slice(&bytes).unwrap_or_default();
        payload.into_transaction_id().ok_or_else(|| {
            warn!("gift card service omitted the transaction id on a 2xx response");
            ServiceError::GiftCardServiceError(
                "transaction id missing from gift card service response".to_string(),
            )
        })
    }
}

fn check_idempotency_key(key: &str) -> Result<(), ServiceError> {
    if key.trim().is_empty() {
        return Err(ServiceError::InvalidInput(
            "Idempotency key is required to prevent duplicate transactions".to_string(),
        ));
    }
    Ok(())
}

fn transport_error(err: reqwest::Error) -> ServiceError {
    ServiceError::GiftCardServiceError(format!("request failed: {}", err))
}

/// Builds the surfaced error text from a non-2xx response body.
///
/// Structured `{errors: [{message|code}]}` entries are joined with ", ";
/// otherwise a top-level `{message}` is used, falling back to a generic
/// status-keyed text.
fn error_text(status: u16, bytes: &[u8]) -> String {
    let fallback = format!("gift card service returned status {}", status);

    let Ok(body) = serde_json::from_slice::<ErrorBody>(bytes) else {
        return fallback;
    };

    if let Some(entries) = body.errors {
        let joined = entries
            .into_iter()
            .filter_map(|entry| entry.message.or(entry.code))
            .collect::<Vec<_>>()
            .join(", ");
        if !joined.is_empty() {
            return joined;
        }
    }

    body.message.unwrap_or(fallback)
}

// Error envelope returned by the gift card service on non-2xx responses.
#[derive(Deserialize)]
struct ErrorBody {
    errors: Option<Vec<ErrorEntry>>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEntry {
    message: Option<String>,
    code: Option<String>,
}

// Wire types. The request side mirrors the service's camelCase contract; the
// response side tolerates the shapes observed in the wild.

#[derive(Serialize)]
struct QueryBody<'a> {
    query: QueryFilter<'a>,
}

#[derive(Serialize)]
struct QueryFilter<'a> {
    filter: CodeFilter<'a>,
}

#[derive(Serialize)]
struct CodeFilter<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QueryPayload {
    Wrapped { data: Vec<GiftCard> },
    List(Vec<GiftCard>),
    Single(GiftCard),
}

impl QueryPayload {
    fn into_first_record(self) -> Option<GiftCard> {
        match self {
            QueryPayload::Wrapped { data } => data.into_iter().next(),
            QueryPayload::List(cards) => cards.into_iter().next(),
            QueryPayload::Single(card) => Some(card),
        }
    }
}

#[derive(Serialize)]
struct TransactionEnvelope<'a> {
    transaction: TransactionWire<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TransactionWire<'a> {
    #[serde(rename = "type")]
    kind: TransactionKind,
    gift_card_id: &'a str,
    amount: String,
    idempotency_key: &'a str,
    source_info: &'a SourceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    redeem_options: Option<RedeemOptionsWire<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    void_options: Option<VoidOptionsWire<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RedeemOptionsWire<'a> {
    order_id: &'a str,
    liability: bool,
    total_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_number: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoidOptionsWire<'a> {
    transaction_id: &'a str,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionResponse {
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    transaction: Option<TransactionRecord>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionRecord {
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
}

impl TransactionResponse {
    fn into_transaction_id(self) -> Option<String> {
        if let Some(id) = self.transaction_id {
            return Some(id);
        }
        self.transaction
            .and_then(|record| record.transaction_id.or(record.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> GiftCardApiConfig {
        GiftCardApiConfig {
            base_url: format!("{}/gift-cards", base),
            api_token: "test-token".into(),
            account_id: "acct-1".into(),
            api_version: "2020-07-16".into(),
            request_timeout: Duration::from_secs(5),
        }
    }

    async fn service_for(server: &MockServer) -> GiftCardService {
        GiftCardService::new(test_config(&server.uri())).unwrap()
    }

    fn debit_request() -> DebitRequest {
        DebitRequest {
            gift_card_id: "gc-1".into(),
            amount: dec!(20.00),
            idempotency_key: "key-1".into(),
            source_info: SourceInfo::default(),
            redeem_options: RedeemOptions {
                order_id: "cart-1".into(),
                liability: false,
                total_price: dec!(50.00),
                order_number: Some("cart-1".into()),
            },
        }
    }

    fn credit_request() -> CreditRequest {
        CreditRequest {
            gift_card_id: "gc-1".into(),
            amount: dec!(20.00),
            idempotency_key: "key-2".into(),
            source_info: SourceInfo::default(),
            void_options: VoidOptions {
                transaction_id: "txn-1".into(),
            },
        }
    }

    #[tokio::test]
    async fn lookup_sends_credentials_and_parses_wrapped_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/query"))
            .and(header("authorization", "Bearer test-token"))
            .and(header(ACCOUNT_ID_HEADER, "acct-1"))
            .and(header(API_VERSION_HEADER, "2020-07-16"))
            .and(body_partial_json(
                json!({"query": {"filter": {"code": "HAPPY50"}}}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "gc-1", "code": "HAPPY50", "balance": "70.00"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let card = service_for(&server).await.lookup("HAPPY50").await.unwrap();
        assert_eq!(card.id.as_deref(), Some("gc-1"));
        assert_eq!(card.balance, "70.00");
    }

    #[tokio::test]
    async fn lookup_parses_bare_array_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "gc-2", "code": "SPRING", "balance": "15.00"}
            ])))
            .mount(&server)
            .await;

        let card = service_for(&server).await.lookup("SPRING").await.unwrap();
        assert_eq!(card.id.as_deref(), Some("gc-2"));
    }

    #[tokio::test]
    async fn lookup_parses_bare_object_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"id": "gc-3", "code": "SOLO", "balance": "5.00"}),
            ))
            .mount(&server)
            .await;

        let card = service_for(&server).await.lookup("SOLO").await.unwrap();
        assert_eq!(card.id.as_deref(), Some("gc-3"));
    }

    #[tokio::test]
    async fn lookup_with_zero_records_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = service_for(&server)
            .await
            .lookup("BADCODE")
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::NotFound(_));
    }

    #[tokio::test]
    async fn structured_errors_are_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/query"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "errors": [
                    {"message": "code is malformed"},
                    {"code": "ACCOUNT_SUSPENDED"}
                ]
            })))
            .mount(&server)
            .await;

        let err = service_for(&server).await.lookup("X").await.unwrap_err();
        assert_matches!(
            err,
            ServiceError::GiftCardServiceError(msg)
                if msg == "code is malformed, ACCOUNT_SUSPENDED"
        );
    }

    #[tokio::test]
    async fn unstructured_error_falls_back_to_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/query"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = service_for(&server).await.lookup("X").await.unwrap_err();
        assert_matches!(
            err,
            ServiceError::GiftCardServiceError(msg)
                if msg == "gift card service returned status 503"
        );
    }

    #[tokio::test]
    async fn debit_posts_redeem_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/gc-1/decrease"))
            .and(body_partial_json(json!({
                "transaction": {
                    "type": "REDEEM",
                    "giftCardId": "gc-1",
                    "amount": "20.00",
                    "idempotencyKey": "key-1",
                    "redeemOptions": {
                        "orderId": "cart-1",
                        "liability": false,
                        "totalPrice": "50.00",
                        "orderNumber": "cart-1"
                    }
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"transactionId": "txn-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let txn = service_for(&server)
            .await
            .debit(debit_request())
            .await
            .unwrap();
        assert_eq!(txn.transaction_id, "txn-1");
        assert_eq!(txn.kind, TransactionKind::Redeem);
        assert_eq!(txn.amount, dec!(20.00));
    }

    #[tokio::test]
    async fn debit_accepts_nested_transaction_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/gc-1/decrease"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "transaction": {"id": "txn-nested"}
            })))
            .mount(&server)
            .await;

        let txn = service_for(&server)
            .await
            .debit(debit_request())
            .await
            .unwrap();
        assert_eq!(txn.transaction_id, "txn-nested");
    }

    #[tokio::test]
    async fn debit_without_transaction_id_fails_even_on_2xx() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/gc-1/decrease"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .mount(&server)
            .await;

        let err = service_for(&server)
            .await
            .debit(debit_request())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::GiftCardServiceError(_));
    }

    #[tokio::test]
    async fn debit_contract_violations_never_reach_the_network() {
        // No mocks mounted: a request hitting the server would 404 and the
        // error kind would differ from the local rejection asserted here.
        let server = MockServer::start().await;
        let service = service_for(&server).await;

        let mut zero_amount = debit_request();
        zero_amount.amount = Decimal::ZERO;
        assert_matches!(
            service.debit(zero_amount).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        );

        let mut blank_key = debit_request();
        blank_key.idempotency_key = "  ".into();
        assert_matches!(
            service.debit(blank_key).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        );
    }

    #[tokio::test]
    async fn credit_posts_void_transaction_referencing_original() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/gift-cards/gc-1/increase"))
            .and(body_partial_json(json!({
                "transaction": {
                    "type": "VOID",
                    "giftCardId": "gc-1",
                    "amount": "20.00",
                    "idempotencyKey": "key-2",
                    "voidOptions": {"transactionId": "txn-1"}
                }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"transactionId": "txn-2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let txn = service_for(&server)
            .await
            .credit(credit_request())
            .await
            .unwrap();
        assert_eq!(txn.transaction_id, "txn-2");
        assert_eq!(txn.kind, TransactionKind::Void);
    }

    #[tokio::test]
    async fn credit_requires_original_transaction_id() {
        let server = MockServer::start().await;
        let service = service_for(&server).await;

        let mut request = credit_request();
        request.void_options.transaction_id = "".into();
        assert_matches!(
            service.credit(request).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        );
    }

    #[test]
    fn error_text_prefers_joined_entries_over_message() {
        let body = json!({
            "errors": [{"message": "first"}, {"message": "second"}],
            "message": "ignored"
        });
        let text = error_text(400, body.to_string().as_bytes());
        assert_eq!(text, "first, second");
    }

    #[test]
    fn error_text_uses_message_when_entries_are_empty() {
        let body = json!({"errors": [], "message": "top level"});
        let text = error_text(400, body.to_string().as_bytes());
        assert_eq!(text, "top level");
    }
}
