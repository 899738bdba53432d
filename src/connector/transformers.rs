//! Wire request/response shapes of the gateway API and their conversions
//! from/to the engine's domain types.
//!
//! Wire keys are snake_case; the mapping to internal names lives entirely in
//! this module.

use masking::Secret;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{
    Authorize, BatchAuthorize, BatchSync, FlowData, PSync, Tokenize,
};
use crate::{
    errors::ConnectorError,
    types::{
        BatchAuthorizeData, BatchResponseData, BatchSyncData, BatchSyncResponseData,
        CardTokenizationData, Currency, Customer, DeviceInformation, MinorUnit, NextAction,
        OrderOutcome, PaymentInstrument, PaymentsAuthorizeData, PaymentsResponseData,
        PaymentsSyncData, PaymentsSyncResponseData, PurchaseOutcome, TokenizedCard,
        TransactionStatus,
    },
    wallet,
};

#[derive(Debug, Serialize)]
pub struct CardPayload {
    pub number: Secret<String>,
    pub expiry_month: Secret<String>,
    pub expiry_year: Secret<String>,
    pub cvc: Secret<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<Secret<String>>,
}

#[derive(Debug, Serialize)]
pub struct TokenizeRequest {
    pub card: CardPayload,
    pub device: DeviceInformation,
}

impl TryFrom<&FlowData<Tokenize, CardTokenizationData, TokenizedCard>> for TokenizeRequest {
    type Error = error_stack::Report<ConnectorError>;
    fn try_from(
        item: &FlowData<Tokenize, CardTokenizationData, TokenizedCard>,
    ) -> Result<Self, Self::Error> {
        let card = &item.request.card;
        Ok(Self {
            card: CardPayload {
                number: card.number.clone(),
                expiry_month: card.expiry_month.clone(),
                expiry_year: card.expiry_year.clone(),
                cvc: card.cvc.clone(),
                holder_name: card.holder_name.clone(),
            },
            device: item.request.device.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenizeResponse {
    pub token: Secret<String>,
    pub expiry: String,
    pub masked_number: String,
    pub issuer: Option<String>,
}

impl From<TokenizeResponse> for TokenizedCard {
    fn from(item: TokenizeResponse) -> Self {
        Self {
            token: item.token,
            expiry: item.expiry,
            masked_number: item.masked_number,
            issuer: item.issuer,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentsRequest {
    pub amount: MinorUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<MinorUnit>,
    pub total: MinorUnit,
    pub currency: Currency,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Secret<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_token: Option<String>,
}

impl TryFrom<&FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>> for PaymentsRequest {
    type Error = error_stack::Report<ConnectorError>;
    fn try_from(
        item: &FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>,
    ) -> Result<Self, Self::Error> {
        let request = &item.request;
        let (token, wallet_token) = split_instrument(&request.instrument)?;
        Ok(Self {
            amount: request.amount.amount,
            tax: request.amount.tax,
            total: request.amount.total,
            currency: request.amount.currency,
            external_id: request.external_id.clone(),
            description: request.description.clone(),
            customer: request.customer.clone(),
            token,
            wallet_token,
        })
    }
}

fn split_instrument(
    instrument: &PaymentInstrument,
) -> Result<(Option<Secret<String>>, Option<String>), error_stack::Report<ConnectorError>> {
    match instrument {
        PaymentInstrument::CardToken(token) => Ok((Some(token.clone()), None)),
        PaymentInstrument::Wallet(credential) => {
            Ok((None, Some(wallet::encoded_wallet_token(credential)?)))
        }
    }
}

/// Wire form of the follow-up action attached to a created transaction.
#[derive(Clone, Debug, Deserialize)]
pub struct ActionDetails {
    #[serde(rename = "type")]
    pub action_type: String,
    pub value: String,
}

impl From<ActionDetails> for NextAction {
    fn from(item: ActionDetails) -> Self {
        if item.action_type == "url" {
            match Url::parse(&item.value) {
                Ok(url) => return Self::ConfirmationUrl(url),
                Err(error) => {
                    tracing::warn!(?error, value = %item.value, "confirmation action carried an unparseable URL");
                }
            }
        }
        Self::Undefined {
            name: item.action_type,
            value: item.value,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentsResponse {
    pub action: Option<ActionDetails>,
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
    pub receipt_url: Option<String>,
}

impl From<PaymentsResponse> for PaymentsResponseData {
    fn from(item: PaymentsResponse) -> Self {
        Self {
            status: item.status,
            payment_id: item.payment_id,
            action: item.action.map(NextAction::from),
            status_code: item.status_code,
            status_description: item.status_description,
            receipt_url: item.receipt_url.and_then(|url| Url::parse(&url).ok()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentsSyncRequest {
    pub external_id: String,
}

impl From<&FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>> for PaymentsSyncRequest {
    fn from(item: &FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>) -> Self {
        Self {
            external_id: item.request.external_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchasePayload {
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentsSyncResponse {
    pub external_id: String,
    #[serde(default)]
    pub purchases: Vec<PurchasePayload>,
    pub receipt_url: Option<String>,
}

impl PaymentsSyncResponse {
    /// The transaction status of the most recent settlement record. An empty
    /// list means the gateway has no record yet, which reads as still
    /// pending, not as a failure.
    fn transaction_status(&self) -> TransactionStatus {
        match self.purchases.last() {
            Some(purchase) => purchase.status,
            None => TransactionStatus::Pending,
        }
    }
}

impl From<PaymentsSyncResponse> for PaymentsSyncResponseData {
    fn from(item: PaymentsSyncResponse) -> Self {
        Self {
            status: item.transaction_status(),
            external_id: item.external_id,
            purchases: item
                .purchases
                .into_iter()
                .map(|purchase| PurchaseOutcome {
                    payment_id: purchase.payment_id,
                    status: purchase.status,
                    status_code: purchase.status_code,
                    status_description: purchase.status_description,
                })
                .collect(),
            receipt_url: item.receipt_url.and_then(|url| Url::parse(&url).ok()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderPayload {
    pub external_id: String,
    pub amount: MinorUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchPaymentsRequest {
    pub batch_external_id: String,
    pub amount: MinorUnit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax: Option<MinorUnit>,
    pub total: MinorUnit,
    pub currency: Currency,
    pub orders: Vec<OrderPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<Secret<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_token: Option<String>,
}

impl TryFrom<&FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>>
    for BatchPaymentsRequest
{
    type Error = error_stack::Report<ConnectorError>;
    fn try_from(
        item: &FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>,
    ) -> Result<Self, Self::Error> {
        let request = &item.request;
        if request.orders.is_empty() {
            return Err(ConnectorError::MissingRequiredField {
                field_name: "orders",
            }
            .into());
        }
        let (token, wallet_token) = split_instrument(&request.instrument)?;
        Ok(Self {
            batch_external_id: request.batch_external_id.clone(),
            amount: request.amount.amount,
            tax: request.amount.tax,
            total: request.amount.total,
            currency: request.amount.currency,
            orders: request
                .orders
                .iter()
                .map(|order| OrderPayload {
                    external_id: order.external_id.clone(),
                    amount: order.amount.total,
                    description: order.description.clone(),
                })
                .collect(),
            customer: request.customer.clone(),
            token,
            wallet_token,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchDetailsPayload {
    pub batch_external_id: String,
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderDetailsPayload {
    pub external_id: String,
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchPaymentsResponse {
    pub action: Option<ActionDetails>,
    pub batch: BatchDetailsPayload,
    #[serde(default)]
    pub orders: Vec<OrderDetailsPayload>,
    pub receipt_url: Option<String>,
}

impl From<BatchPaymentsResponse> for BatchResponseData {
    fn from(item: BatchPaymentsResponse) -> Self {
        Self {
            batch_external_id: item.batch.batch_external_id,
            status: item.batch.status,
            action: item.action.map(NextAction::from),
            status_code: item.batch.status_code,
            status_description: item.batch.status_description,
            orders: item
                .orders
                .into_iter()
                .map(|order| OrderOutcome {
                    external_id: order.external_id,
                    payment_id: order.payment_id,
                    status: order.status,
                    status_code: order.status_code,
                    status_description: order.status_description,
                })
                .collect(),
            receipt_url: item.receipt_url.and_then(|url| Url::parse(&url).ok()),
        }
    }
}

/// The batch status probe sends only the batch id: the gateway keeps the
/// order composition server-side.
#[derive(Debug, Serialize)]
pub struct BatchSyncRequest {
    pub batch_external_id: String,
}

impl From<&FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>> for BatchSyncRequest {
    fn from(item: &FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>) -> Self {
        Self {
            batch_external_id: item.request.batch_external_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchSyncResponse {
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

impl From<BatchSyncResponse> for BatchSyncResponseData {
    fn from(item: BatchSyncResponse) -> Self {
        Self {
            status: item.status,
            status_code: item.status_code,
            status_description: item.status_description,
        }
    }
}

/// Structured error body the gateway sends with non-2xx responses.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GatewayErrorResponse {
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub message: Option<String>,
    pub description: Option<String>,
    pub param: Option<String>,
    pub error_id: Option<String>,
    pub external_id: Option<String>,
    pub payment_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_action_classifies_as_confirmation() {
        let action = ActionDetails {
            action_type: "url".to_string(),
            value: "https://acs.bank.example/challenge?tx=1".to_string(),
        };
        match NextAction::from(action) {
            NextAction::ConfirmationUrl(url) => {
                assert_eq!(url.as_str(), "https://acs.bank.example/challenge?tx=1");
            }
            other => panic!("expected confirmation url, got {other:?}"),
        }
    }

    #[test]
    fn non_url_action_is_kept_verbatim() {
        let action = ActionDetails {
            action_type: "sms_otp".to_string(),
            value: "+380001112233".to_string(),
        };
        assert_eq!(
            NextAction::from(action),
            NextAction::Undefined {
                name: "sms_otp".to_string(),
                value: "+380001112233".to_string(),
            }
        );
    }

    #[test]
    fn url_action_with_garbage_value_is_kept_verbatim() {
        let action = ActionDetails {
            action_type: "url".to_string(),
            value: "not a url at all".to_string(),
        };
        assert!(matches!(NextAction::from(action), NextAction::Undefined { .. }));
    }

    #[test]
    fn payments_response_decodes_with_action() {
        let body = r#"{
            "action": {"type": "url", "value": "https://acs.bank.example/challenge"},
            "payment_id": "pay_42",
            "status": "pending",
            "status_code": "wait_3ds",
            "status_description": "Waiting for cardholder confirmation",
            "receipt_url": null
        }"#;
        let response: PaymentsResponse = serde_json::from_str(body).unwrap();
        let data = PaymentsResponseData::from(response);
        assert_eq!(data.status, TransactionStatus::Pending);
        assert_eq!(data.payment_id.as_deref(), Some("pay_42"));
        assert!(matches!(data.action, Some(NextAction::ConfirmationUrl(_))));
    }

    #[test]
    fn sync_status_comes_from_the_most_recent_purchase() {
        let body = r#"{
            "external_id": "ord-1",
            "purchases": [
                {"payment_id": "pay_1", "status": "failure", "status_code": "wrong_cvv", "status_description": null},
                {"payment_id": "pay_2", "status": "success", "status_code": null, "status_description": null}
            ],
            "receipt_url": "https://gateway.example/receipt/1"
        }"#;
        let response: PaymentsSyncResponse = serde_json::from_str(body).unwrap();
        let data = PaymentsSyncResponseData::from(response);
        assert_eq!(data.status, TransactionStatus::Success);
        assert_eq!(data.purchases.len(), 2);
        assert!(data.receipt_url.is_some());
    }

    #[test]
    fn sync_without_purchases_reads_as_pending() {
        let body = r#"{"external_id": "ord-1", "purchases": [], "receipt_url": null}"#;
        let response: PaymentsSyncResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.transaction_status(), TransactionStatus::Pending);
    }

    #[test]
    fn absent_optional_fields_are_not_serialized() {
        let request = PaymentsRequest {
            amount: MinorUnit::new(10_000),
            tax: None,
            total: MinorUnit::new(10_000),
            currency: Currency::UAH,
            external_id: "ord-1".to_string(),
            description: None,
            customer: None,
            token: Some(Secret::new("tok_1".to_string())),
            wallet_token: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.contains(&"amount"));
        assert!(keys.contains(&"token"));
        assert!(!keys.contains(&"tax"));
        assert!(!keys.contains(&"wallet_token"));
    }
}
