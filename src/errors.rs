//! Error types and the unified gateway error taxonomy.

use serde::{Deserialize, Serialize};

/// Result alias carrying an `error_stack` report.
pub type CustomResult<T, E> = error_stack::Result<T, E>;

/// Errors while producing or verifying message signatures.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Failed to encode given message")]
    EncodingFailed,
    #[error("Failed to sign message")]
    MessageSigningFailed,
}

/// Errors while decoding a wire payload into a typed struct.
#[derive(Debug, thiserror::Error)]
pub enum ParsingError {
    #[error("Failed to parse struct: {0}")]
    StructParseFailure(&'static str),
}

/// Transport-level failures: the request never produced an HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("Failed to construct the HTTP client")]
    ClientConstructionFailed,
    #[error("URL encoding of the request failed")]
    UrlEncodingFailed,
    #[error("Failed to construct the request header map")]
    HeaderMapConstructionFailed,
    #[error("The request timed out before a response was received")]
    RequestTimeoutReceived,
    #[error("Connection to the gateway was closed before a response was received")]
    ConnectionClosed,
    #[error("Failed to send the request: {0}")]
    RequestNotSent(String),
    #[error("Failed to read the response body")]
    ResponseDecodingFailed,
    #[error("The gateway returned an unexpected response status")]
    UnexpectedServerResponse,
}

impl ApiClientError {
    /// Whether this failure represents the request timing out upstream.
    pub fn is_upstream_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeoutReceived)
    }
}

/// Failures inside the request/response processing pipeline.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConnectorError {
    #[error("Failed to obtain authentication type")]
    FailedToObtainAuthType,
    #[error("Failed to encode gateway request")]
    RequestEncodingFailed,
    #[error("Failed to deserialize gateway response")]
    ResponseDeserializationFailed,
    #[error("Missing required field: {field_name}")]
    MissingRequiredField { field_name: &'static str },
    #[error("Failed to parse {wallet_name} wallet token")]
    InvalidWalletToken { wallet_name: String },
}

/// Rejected engine configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid gateway base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Invalid confirmation callback URL: {0}")]
    InvalidCallbackUrl(String),
}

macro_rules! open_wire_enum {
    ($(#[$docs:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$docs])*
        #[derive(Clone, Debug, Eq, PartialEq)]
        pub enum $name {
            $($variant,)+
            /// A wire value outside the known set, preserved verbatim
            Unknown(String),
        }

        impl $name {
            /// Total decoder: every input, including absent or empty strings,
            /// maps to a concrete variant.
            pub fn from_wire(value: Option<&str>) -> Self {
                match value {
                    $(Some($wire) => Self::$variant,)+
                    Some(other) if !other.is_empty() => Self::Unknown(other.to_string()),
                    _ => Self::Unknown("unknown".to_string()),
                }
            }

            /// The wire form of this value. Round-trips through `from_wire`
            /// for every variant, including `Unknown`.
            pub fn as_wire(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Unknown(raw) => raw,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_wire())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_wire())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Ok(Self::from_wire(Some(&value)))
            }
        }
    };
}

open_wire_enum! {
    /// Gateway error codes. The known set covers what the gateway documents;
    /// anything else survives in the `Unknown` escape variant instead of
    /// being discarded.
    ErrorCode {
        InvalidRequest => "invalid_request",
        InvalidSignature => "invalid_signature",
        InvalidAmount => "invalid_amount",
        InvalidCurrency => "invalid_currency",
        InvalidCardNumber => "invalid_card_number",
        WrongCvv => "wrong_cvv",
        CardExpired => "card_expired",
        InsufficientFunds => "insufficient_funds",
        LimitExceeded => "limit_exceeded",
        TransactionDeclined => "transaction_declined",
        OrderNotFound => "order_not_found",
        DuplicateExternalId => "duplicate_external_id",
        AccessDenied => "access_denied",
        RequestTimeout => "request_timeout",
        NetworkUnreachable => "network_unreachable",
    }
}

open_wire_enum! {
    /// Gateway error categories.
    ErrorType {
        ValidationError => "validation_error",
        PaymentError => "payment_error",
        TokenizationError => "tokenization_error",
        NetworkError => "network_error",
        ApiError => "api_error",
    }
}

/// The unified error value every failed operation resolves to.
///
/// Correlation ids are back-filled through the `with_*` transforms once they
/// become known; the value itself stays immutable.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentError {
    pub code: ErrorCode,
    pub error_type: ErrorType,
    pub message: Option<String>,
    pub description: Option<String>,
    pub external_id: Option<String>,
    pub payment_id: Option<String>,
    pub param: Option<String>,
    pub error_id: Option<String>,
}

impl PaymentError {
    pub fn new(code: ErrorCode, error_type: ErrorType) -> Self {
        Self {
            code,
            error_type,
            message: None,
            description: None,
            external_id: None,
            payment_id: None,
            param: None,
            error_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Returns a copy carrying the given order id, leaving an already known
    /// id untouched.
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id.get_or_insert_with(|| external_id.into());
        self
    }

    /// Returns a copy carrying the given gateway payment id, leaving an
    /// already known id untouched.
    pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id.get_or_insert_with(|| payment_id.into());
        self
    }

    /// Error synthesized when no response was received at all.
    pub fn network_unreachable() -> Self {
        Self::new(ErrorCode::NetworkUnreachable, ErrorType::NetworkError)
            .with_message(crate::consts::NETWORK_UNREACHABLE_MESSAGE)
    }

    /// Error synthesized when the polling window elapses while the
    /// transaction is still pending.
    pub fn poll_timeout() -> Self {
        Self::new(ErrorCode::RequestTimeout, ErrorType::ApiError)
            .with_message(crate::consts::POLL_TIMEOUT_MESSAGE)
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => f.write_str(message)?,
            None => write!(f, "{} ({})", self.code, self.error_type)?,
        }
        if let Some(external_id) = &self.external_id {
            write!(f, " [order: {external_id}]")?;
        }
        if let Some(payment_id) = &self.payment_id {
            write!(f, " [payment: {payment_id}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_CODES: &[&str] = &[
        "invalid_request",
        "invalid_signature",
        "invalid_amount",
        "invalid_currency",
        "invalid_card_number",
        "wrong_cvv",
        "card_expired",
        "insufficient_funds",
        "limit_exceeded",
        "transaction_declined",
        "order_not_found",
        "duplicate_external_id",
        "access_denied",
        "request_timeout",
        "network_unreachable",
    ];

    #[test]
    fn known_codes_round_trip() {
        for wire in KNOWN_CODES {
            let code = ErrorCode::from_wire(Some(wire));
            assert!(!matches!(code, ErrorCode::Unknown(_)), "{wire} decoded as unknown");
            assert_eq!(code.as_wire(), *wire);
        }
    }

    #[test]
    fn unknown_code_is_preserved_verbatim() {
        let code = ErrorCode::from_wire(Some("brand_new_gateway_code"));
        assert_eq!(code, ErrorCode::Unknown("brand_new_gateway_code".to_string()));
        assert_eq!(code.as_wire(), "brand_new_gateway_code");
    }

    #[test]
    fn absent_and_empty_codes_decode_to_unknown() {
        assert_eq!(ErrorCode::from_wire(None), ErrorCode::Unknown("unknown".to_string()));
        assert_eq!(ErrorCode::from_wire(Some("")), ErrorCode::Unknown("unknown".to_string()));
    }

    #[test]
    fn error_type_round_trips_through_serde() {
        let error_type: ErrorType = serde_json::from_str("\"payment_error\"").unwrap();
        assert_eq!(error_type, ErrorType::PaymentError);
        assert_eq!(serde_json::to_string(&error_type).unwrap(), "\"payment_error\"");

        let unknown: ErrorType = serde_json::from_str("\"weird\"").unwrap();
        assert_eq!(serde_json::to_string(&unknown).unwrap(), "\"weird\"");
    }

    #[test]
    fn id_backfill_does_not_overwrite() {
        let error = PaymentError::new(ErrorCode::WrongCvv, ErrorType::PaymentError)
            .with_external_id("ord-1")
            .with_external_id("ord-2");
        assert_eq!(error.external_id.as_deref(), Some("ord-1"));
    }

    #[test]
    fn display_prefers_server_message() {
        let error = PaymentError::new(ErrorCode::WrongCvv, ErrorType::PaymentError)
            .with_message("Wrong CVV2 code")
            .with_external_id("ord-1");
        assert_eq!(error.to_string(), "Wrong CVV2 code [order: ord-1]");
    }

    #[test]
    fn display_synthesizes_without_server_message() {
        let error = PaymentError::new(ErrorCode::NetworkUnreachable, ErrorType::NetworkError);
        assert_eq!(error.to_string(), "network_unreachable (network_error)");
    }
}
