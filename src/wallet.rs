//! Wallet credential adapter.
//!
//! Converts the opaque credential blob handed over by the platform wallet
//! prompt into the token envelope the gateway expects. Pure transform, no
//! network I/O.

use error_stack::ResultExt;
use masking::{PeekInterface, Secret};
use serde::Serialize;

use crate::{
    consts::BASE64_ENGINE,
    errors::{ConnectorError, CustomResult},
};
use base64::Engine;

const WALLET_NAME: &str = "platform wallet";

/// The credential produced by the external wallet payment prompt.
#[derive(Clone, Debug)]
pub struct WalletCredential {
    /// Opaque payment credential blob, JSON text by contract
    pub payment_data: Secret<String>,
    pub payment_method: WalletPaymentMethod,
    pub transaction_identifier: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct WalletPaymentMethod {
    pub display_name: String,
    pub network: String,
    #[serde(rename = "type")]
    pub pm_type: String,
}

#[derive(Serialize)]
struct WalletTokenEnvelope<'a> {
    payment_data: serde_json::Value,
    payment_method: &'a WalletPaymentMethod,
    transaction_identifier: &'a str,
}

/// Wraps the wallet credential into the gateway token envelope and
/// base64-encodes it. Fails if the credential blob is not well-formed JSON.
pub fn encoded_wallet_token(credential: &WalletCredential) -> CustomResult<String, ConnectorError> {
    let payment_data: serde_json::Value = serde_json::from_str(credential.payment_data.peek())
        .change_context(ConnectorError::InvalidWalletToken {
            wallet_name: WALLET_NAME.to_string(),
        })?;

    let envelope = WalletTokenEnvelope {
        payment_data,
        payment_method: &credential.payment_method,
        transaction_identifier: &credential.transaction_identifier,
    };
    let token_as_vec = serde_json::to_vec(&envelope).change_context(
        ConnectorError::InvalidWalletToken {
            wallet_name: WALLET_NAME.to_string(),
        },
    )?;
    Ok(BASE64_ENGINE.encode(token_as_vec))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(payment_data: &str) -> WalletCredential {
        WalletCredential {
            payment_data: Secret::new(payment_data.to_string()),
            payment_method: WalletPaymentMethod {
                display_name: "Visa 1234".to_string(),
                network: "visa".to_string(),
                pm_type: "debit".to_string(),
            },
            transaction_identifier: "txn-1".to_string(),
        }
    }

    #[test]
    fn envelope_is_base64_of_the_expected_json() {
        let token = encoded_wallet_token(&credential(r#"{"data": "opaque", "version": "EC_v1"}"#))
            .unwrap();
        let decoded = BASE64_ENGINE.decode(token).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(value["payment_data"]["version"], "EC_v1");
        assert_eq!(value["payment_method"]["type"], "debit");
        assert_eq!(value["transaction_identifier"], "txn-1");
    }

    #[test]
    fn malformed_credential_blob_is_rejected() {
        let result = encoded_wallet_token(&credential("not json"));
        assert!(matches!(
            result.unwrap_err().current_context(),
            ConnectorError::InvalidWalletToken { .. }
        ));
    }
}
