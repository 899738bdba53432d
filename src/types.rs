//! Domain value types shared across the engine.
//!
//! Everything here is a plain value: request/response data is constructed per
//! operation, passed by value through the pipeline and discarded on return.
//! Monetary fields are integer minor-currency units throughout.

use masking::Secret;
use serde::{Deserialize, Serialize};
use url::Url;

/// Amount in the minor denomination of its currency (cents, kopiykas, ...).
///
/// Arithmetic on amounts stays in integer space; nothing in the engine ever
/// converts to floating point.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct MinorUnit(i64);

impl MinorUnit {
    /// Forms a new minor unit from an i64 amount
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Gets the amount as an i64 value
    pub fn get_amount_as_i64(self) -> i64 {
        self.0
    }
}

impl std::ops::Add for MinorUnit {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::fmt::Display for MinorUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currencies accepted by the gateway.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Currency {
    CZK,
    EUR,
    GBP,
    HUF,
    KZT,
    MDL,
    PLN,
    RON,
    UAH,
    USD,
}

/// A monetary amount with its tax component and materialized total.
///
/// `total` is fixed at construction time; downstream code never re-derives it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Amount {
    pub amount: MinorUnit,
    pub tax: Option<MinorUnit>,
    pub total: MinorUnit,
    pub currency: Currency,
}

impl Amount {
    /// Builds an amount, computing `total = amount + tax` unless an explicit
    /// total is supplied.
    pub fn new(
        amount: MinorUnit,
        tax: Option<MinorUnit>,
        total: Option<MinorUnit>,
        currency: Currency,
    ) -> Self {
        Self {
            amount,
            tax,
            total: total.unwrap_or(amount + tax.unwrap_or_default()),
            currency,
        }
    }
}

/// Processing state of a transaction as reported by the gateway.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TransactionStatus {
    Start,
    Pending,
    Success,
    #[default]
    Failure,
}

impl TransactionStatus {
    /// Total decoder over wire strings. Unrecognized values collapse to
    /// `Failure` so that a drifting gateway contract can never park a
    /// transaction in a non-state.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "start" => Self::Start,
            "pending" => Self::Pending,
            "success" => Self::Success,
            "failure" => Self::Failure,
            other => {
                tracing::warn!(status = %other, "unrecognized transaction status, treating as failure");
                Self::Failure
            }
        }
    }

    /// No transition leaves `success` or `failure`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&value))
    }
}

/// Follow-up the gateway asks for after creating a transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum NextAction {
    /// Redirect the customer to this URL for step-up confirmation
    ConfirmationUrl(Url),
    /// Any action the engine does not understand, kept verbatim
    Undefined { name: String, value: String },
}

/// Caller-supplied credential for authenticating gateway requests. Supplied
/// per call and never stored by the engine.
#[derive(Clone, Debug)]
pub enum ConnectorAuthType {
    /// A bare API token sent in the credential header
    HeaderKey { api_key: Secret<String> },
    /// A key pair: the identifier travels in the credential header, the
    /// secret signs each request body
    SignatureKey {
        api_key: Secret<String>,
        api_secret: Secret<String>,
    },
}

/// Raw card data collected for tokenization.
#[derive(Clone, Debug)]
pub struct Card {
    pub number: Secret<String>,
    pub expiry_month: Secret<String>,
    pub expiry_year: Secret<String>,
    pub cvc: Secret<String>,
    pub holder_name: Option<Secret<String>>,
}

/// Opaque device and application metadata, included verbatim in tokenization
/// requests. Collection happens outside the engine.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DeviceInformation {
    pub platform: Option<String>,
    pub os_version: Option<String>,
    pub device_id: Option<String>,
    pub locale: Option<String>,
    pub ip_address: Option<String>,
    pub screen_size: Option<String>,
}

/// Customer contact details attached to a payment.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Customer {
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// The instrument a payment is made with.
#[derive(Clone, Debug)]
pub enum PaymentInstrument {
    /// A token previously obtained from the tokenization endpoint
    CardToken(Secret<String>),
    /// A wallet credential, converted into the gateway token envelope by
    /// [`crate::wallet::encoded_wallet_token`]
    Wallet(crate::wallet::WalletCredential),
}

/// Request data for the tokenization flow.
#[derive(Clone, Debug)]
pub struct CardTokenizationData {
    pub card: Card,
    pub device: DeviceInformation,
}

/// Request data for creating a single payment.
#[derive(Clone, Debug)]
pub struct PaymentsAuthorizeData {
    pub amount: Amount,
    pub external_id: String,
    pub description: Option<String>,
    pub customer: Option<Customer>,
    pub instrument: PaymentInstrument,
}

/// Request data for probing the status of a single payment.
#[derive(Clone, Debug)]
pub struct PaymentsSyncData {
    pub external_id: String,
}

/// One sub-order of a batch payment.
#[derive(Clone, Debug)]
pub struct OrderData {
    pub external_id: String,
    pub amount: Amount,
    pub description: Option<String>,
}

/// Request data for creating a batch payment settling several orders at once.
#[derive(Clone, Debug)]
pub struct BatchAuthorizeData {
    pub batch_external_id: String,
    pub amount: Amount,
    pub orders: Vec<OrderData>,
    pub customer: Option<Customer>,
    pub instrument: PaymentInstrument,
}

/// Request data for probing the status of a batch payment.
#[derive(Clone, Debug)]
pub struct BatchSyncData {
    pub batch_external_id: String,
}

/// A tokenized card as returned by the gateway.
#[derive(Clone, Debug)]
pub struct TokenizedCard {
    pub token: Secret<String>,
    pub expiry: String,
    pub masked_number: String,
    pub issuer: Option<String>,
}

/// Decoded response of the payment creation endpoint.
#[derive(Clone, Debug)]
pub struct PaymentsResponseData {
    pub status: TransactionStatus,
    pub payment_id: Option<String>,
    pub action: Option<NextAction>,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
    pub receipt_url: Option<Url>,
}

/// Settlement record for one purchase inside a status response.
#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseOutcome {
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

/// Decoded response of the payment status endpoint.
#[derive(Clone, Debug)]
pub struct PaymentsSyncResponseData {
    pub external_id: String,
    pub status: TransactionStatus,
    pub purchases: Vec<PurchaseOutcome>,
    pub receipt_url: Option<Url>,
}

/// Per-order result inside a batch creation response.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderOutcome {
    pub external_id: String,
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

/// Decoded response of the batch payment creation endpoint.
#[derive(Clone, Debug)]
pub struct BatchResponseData {
    pub batch_external_id: String,
    pub status: TransactionStatus,
    pub action: Option<NextAction>,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
    pub orders: Vec<OrderOutcome>,
    pub receipt_url: Option<Url>,
}

/// Decoded response of the batch status endpoint.
#[derive(Clone, Debug)]
pub struct BatchSyncResponseData {
    pub status: TransactionStatus,
    pub status_code: Option<String>,
    pub status_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_materialized_from_amount_and_tax() {
        let amount = Amount::new(
            MinorUnit::new(10_000),
            Some(MinorUnit::new(250)),
            None,
            Currency::UAH,
        );
        assert_eq!(amount.total, MinorUnit::new(10_250));
    }

    #[test]
    fn total_defaults_to_amount_without_tax() {
        let amount = Amount::new(MinorUnit::new(500), None, None, Currency::EUR);
        assert_eq!(amount.total, MinorUnit::new(500));
    }

    #[test]
    fn explicit_total_is_preserved_exactly() {
        let amount = Amount::new(
            MinorUnit::new(10_000),
            Some(MinorUnit::new(250)),
            Some(MinorUnit::new(9_999)),
            Currency::UAH,
        );
        assert_eq!(amount.total, MinorUnit::new(9_999));
    }

    #[test]
    fn known_statuses_decode_to_themselves() {
        assert_eq!(TransactionStatus::from_wire("start"), TransactionStatus::Start);
        assert_eq!(TransactionStatus::from_wire("pending"), TransactionStatus::Pending);
        assert_eq!(TransactionStatus::from_wire("success"), TransactionStatus::Success);
        assert_eq!(TransactionStatus::from_wire("failure"), TransactionStatus::Failure);
    }

    #[test]
    fn unrecognized_status_fails_closed() {
        assert_eq!(
            TransactionStatus::from_wire("definitely_not_a_status"),
            TransactionStatus::Failure
        );
    }

    #[test]
    fn status_deserialization_never_errors() {
        let status: TransactionStatus = serde_json::from_str("\"garbage\"").unwrap();
        assert_eq!(status, TransactionStatus::Failure);
        let status: TransactionStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, TransactionStatus::Pending);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failure.is_terminal());
        assert!(!TransactionStatus::Start.is_terminal());
        assert!(!TransactionStatus::Pending.is_terminal());
    }
}
