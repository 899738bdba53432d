//! Client-side engine for driving multi-step, asynchronous transactions
//! against a remote payment gateway.
//!
//! The engine authenticates requests by signing their canonical form,
//! submits payment / tokenization / batch-payment requests, folds the
//! gateway's heterogeneous failure shapes into one error taxonomy, and polls
//! for a terminal status whenever the gateway defers completion (pending
//! settlement, step-up authentication).
//!
//! ```no_run
//! use gateway_engine::{ConnectorAuthType, GatewayConfig, PaymentsClient};
//! use gateway_engine::types::{Amount, Currency, MinorUnit, PaymentInstrument, PaymentsAuthorizeData};
//! use masking::Secret;
//!
//! # async fn run() {
//! let client = PaymentsClient::new(GatewayConfig::new(
//!     "https://api.gateway.example",
//!     "https://merchant.example/callback",
//! ))
//! .unwrap();
//!
//! let auth = ConnectorAuthType::SignatureKey {
//!     api_key: Secret::new("merchant_1".to_string()),
//!     api_secret: Secret::new("top-secret".to_string()),
//! };
//! let outcome = client
//!     .create_payment(
//!         &auth,
//!         PaymentsAuthorizeData {
//!             amount: Amount::new(MinorUnit::new(10_000), None, None, Currency::UAH),
//!             external_id: "ord-1".to_string(),
//!             description: None,
//!             customer: None,
//!             instrument: PaymentInstrument::CardToken(Secret::new("tok_1".to_string())),
//!         },
//!         None,
//!     )
//!     .await;
//! # let _ = outcome;
//! # }
//! ```

pub mod authentication;
pub mod configs;
pub mod connector;
pub mod consts;
pub mod crypto;
pub mod errors;
pub mod ext_traits;
pub mod payments;
pub mod request;
pub mod services;
pub mod types;
pub mod wallet;

pub use configs::{GatewayConfig, PollConfig};
pub use errors::{ErrorCode, ErrorType, PaymentError};
pub use payments::{
    BatchPaymentOutcome, PaymentOutcome, PaymentsClient, StatusOutcome, TokenizeOutcome,
};
pub use types::ConnectorAuthType;
