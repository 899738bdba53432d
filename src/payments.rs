//! Payment lifecycle orchestration.
//!
//! Each operation is a single independent invocation: create, then — when the
//! gateway defers — confirm and poll until a terminal status or the polling
//! window closes. All state is local to the call; concurrent operations never
//! share anything but the HTTP connection pool.

use tokio::sync::oneshot;
use url::Url;

use crate::{
    authentication::ConfirmationOutcome,
    configs::GatewayConfig,
    connector::{
        Authorize, BatchAuthorize, BatchSync, ConnectorIntegration, FlowData, Gateway, PSync,
        Tokenize,
    },
    consts,
    errors::{ConfigError, ConnectorError, CustomResult, ErrorCode, ErrorType, PaymentError},
    services,
    types::{
        BatchAuthorizeData, BatchResponseData, BatchSyncData, BatchSyncResponseData,
        CardTokenizationData, ConnectorAuthType, NextAction, OrderOutcome, PaymentsAuthorizeData,
        PaymentsResponseData, PaymentsSyncData, PaymentsSyncResponseData, TokenizedCard,
        TransactionStatus,
    },
};

/// Terminal result of a tokenization attempt.
#[derive(Clone, Debug)]
pub enum TokenizeOutcome {
    Tokenized(TokenizedCard),
    Failed(PaymentError),
}

/// Terminal result of a single payment creation.
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentOutcome {
    Success {
        external_id: String,
        payment_id: Option<String>,
        receipt_url: Option<Url>,
    },
    Failed(PaymentError),
    /// The gateway requires a step-up confirmation before the payment can
    /// complete. Drive [`crate::authentication::ConfirmationFlow`] with
    /// these URLs, then resolve through
    /// [`PaymentsClient::resolve_confirmation`].
    ConfirmationRequired { url: Url, callback_url: Url },
    Cancelled,
}

/// Terminal result of a batch payment creation.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchPaymentOutcome {
    Success {
        batch_external_id: String,
        orders: Vec<OrderOutcome>,
        receipt_url: Option<Url>,
    },
    Failed(PaymentError),
    ConfirmationRequired { url: Url, callback_url: Url },
    Cancelled,
}

/// Result of a status probe or polling loop.
#[derive(Clone, Debug, PartialEq)]
pub enum StatusOutcome {
    Complete {
        external_id: String,
        payment_id: Option<String>,
        receipt_url: Option<Url>,
    },
    /// Not terminal yet. Carries the timeout error when the polling window
    /// elapsed; the caller decides whether to ask again later.
    Pending {
        message: String,
        error: Option<PaymentError>,
    },
    Failed(PaymentError),
    Cancelled,
}

/// Client-side engine for one payment gateway.
///
/// Holds only immutable configuration; credentials arrive with each call and
/// are never stored.
#[derive(Clone, Debug)]
pub struct PaymentsClient {
    config: GatewayConfig,
    callback_url: Url,
}

impl PaymentsClient {
    /// Validates the configuration up front so that a misconfigured engine
    /// fails at construction, not on first use.
    pub fn new(config: GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let callback_url = Url::parse(&config.callback_url)
            .map_err(|_| ConfigError::InvalidCallbackUrl(config.callback_url.clone()))?;
        Ok(Self {
            config,
            callback_url,
        })
    }

    /// Exchanges raw card data for a reusable token.
    pub async fn tokenize(
        &self,
        auth: &ConnectorAuthType,
        data: CardTokenizationData,
    ) -> TokenizeOutcome {
        let flow_data =
            FlowData::<Tokenize, CardTokenizationData, TokenizedCard>::from_request(
                auth.clone(),
                data,
            );
        match self.execute(flow_data).await {
            Ok(flow) => match flow.response {
                Ok(card) => TokenizeOutcome::Tokenized(card),
                Err(error_response) => TokenizeOutcome::Failed(PaymentError::from(error_response)),
            },
            Err(report) => TokenizeOutcome::Failed(connector_failure_error(&report)),
        }
    }

    /// Creates a single payment and classifies the gateway's answer.
    pub async fn create_payment(
        &self,
        auth: &ConnectorAuthType,
        data: PaymentsAuthorizeData,
        mut cancellation: Option<oneshot::Receiver<()>>,
    ) -> PaymentOutcome {
        let external_id = data.external_id.clone();
        let flow_data =
            FlowData::<Authorize, PaymentsAuthorizeData, PaymentsResponseData>::from_request(
                auth.clone(),
                data,
            )
            .with_external_id(external_id.clone());

        let result = match with_cancellation(&mut cancellation, self.execute(flow_data)).await {
            Some(result) => result,
            None => return PaymentOutcome::Cancelled,
        };
        match result {
            Ok(flow) => match flow.response {
                Ok(response) => self.classify_payment_created(external_id, response),
                Err(error_response) => PaymentOutcome::Failed(
                    PaymentError::from(error_response).with_external_id(external_id),
                ),
            },
            Err(report) => PaymentOutcome::Failed(
                connector_failure_error(&report).with_external_id(external_id),
            ),
        }
    }

    /// Creates a batch payment settling several orders in one transaction.
    pub async fn create_batch_payment(
        &self,
        auth: &ConnectorAuthType,
        data: BatchAuthorizeData,
        mut cancellation: Option<oneshot::Receiver<()>>,
    ) -> BatchPaymentOutcome {
        let batch_external_id = data.batch_external_id.clone();
        let flow_data =
            FlowData::<BatchAuthorize, BatchAuthorizeData, BatchResponseData>::from_request(
                auth.clone(),
                data,
            )
            .with_external_id(batch_external_id.clone());

        let result = match with_cancellation(&mut cancellation, self.execute(flow_data)).await {
            Some(result) => result,
            None => return BatchPaymentOutcome::Cancelled,
        };
        match result {
            Ok(flow) => match flow.response {
                Ok(response) => self.classify_batch_created(batch_external_id, response),
                Err(error_response) => BatchPaymentOutcome::Failed(
                    PaymentError::from(error_response).with_external_id(batch_external_id),
                ),
            },
            Err(report) => BatchPaymentOutcome::Failed(
                connector_failure_error(&report).with_external_id(batch_external_id),
            ),
        }
    }

    /// Probes the status of a single payment once.
    pub async fn check_payment(
        &self,
        auth: &ConnectorAuthType,
        external_id: &str,
    ) -> StatusOutcome {
        let flow_data =
            FlowData::<PSync, PaymentsSyncData, PaymentsSyncResponseData>::from_request(
                auth.clone(),
                PaymentsSyncData {
                    external_id: external_id.to_string(),
                },
            )
            .with_external_id(external_id);
        match self.execute(flow_data).await {
            Ok(flow) => match flow.response {
                Ok(response) => classify_payment_sync(external_id, response),
                Err(error_response) => StatusOutcome::Failed(
                    PaymentError::from(error_response).with_external_id(external_id),
                ),
            },
            Err(report) => StatusOutcome::Failed(
                connector_failure_error(&report).with_external_id(external_id),
            ),
        }
    }

    /// Probes the status of a batch payment once.
    pub async fn check_batch_payment(
        &self,
        auth: &ConnectorAuthType,
        batch_external_id: &str,
    ) -> StatusOutcome {
        let flow_data = FlowData::<BatchSync, BatchSyncData, BatchSyncResponseData>::from_request(
            auth.clone(),
            BatchSyncData {
                batch_external_id: batch_external_id.to_string(),
            },
        )
        .with_external_id(batch_external_id);
        match self.execute(flow_data).await {
            Ok(flow) => match flow.response {
                Ok(response) => classify_batch_sync(batch_external_id, response),
                Err(error_response) => StatusOutcome::Failed(
                    PaymentError::from(error_response).with_external_id(batch_external_id),
                ),
            },
            Err(report) => StatusOutcome::Failed(
                connector_failure_error(&report).with_external_id(batch_external_id),
            ),
        }
    }

    /// Polls the payment status until it turns terminal, the configured
    /// window elapses, or the cancellation signal fires.
    pub async fn poll_payment(
        &self,
        auth: &ConnectorAuthType,
        external_id: &str,
        cancellation: Option<oneshot::Receiver<()>>,
    ) -> StatusOutcome {
        self.poll_loop(|| self.check_payment(auth, external_id), cancellation)
            .await
    }

    /// Batch counterpart of [`Self::poll_payment`]: the identical loop
    /// against the batch status endpoint.
    pub async fn poll_batch_payment(
        &self,
        auth: &ConnectorAuthType,
        batch_external_id: &str,
        cancellation: Option<oneshot::Receiver<()>>,
    ) -> StatusOutcome {
        self.poll_loop(
            || self.check_batch_payment(auth, batch_external_id),
            cancellation,
        )
        .await
    }

    /// Resolves a payment that went through the step-up confirmation flow.
    pub async fn resolve_confirmation(
        &self,
        auth: &ConnectorAuthType,
        external_id: &str,
        outcome: ConfirmationOutcome,
        cancellation: Option<oneshot::Receiver<()>>,
    ) -> StatusOutcome {
        match outcome {
            ConfirmationOutcome::Success => {
                self.poll_payment(auth, external_id, cancellation).await
            }
            ConfirmationOutcome::Cancelled => StatusOutcome::Cancelled,
            ConfirmationOutcome::Failed(error) => {
                StatusOutcome::Failed(error.with_external_id(external_id))
            }
        }
    }

    async fn execute<F, Req, Resp>(
        &self,
        flow_data: FlowData<F, Req, Resp>,
    ) -> CustomResult<FlowData<F, Req, Resp>, ConnectorError>
    where
        Gateway: ConnectorIntegration<F, Req, Resp>,
        F: Clone + std::fmt::Debug,
        Req: Clone + std::fmt::Debug,
        Resp: Clone + std::fmt::Debug,
    {
        services::execute_connector_processing_step(Gateway::new(), &flow_data, &self.config).await
    }

    fn classify_payment_created(
        &self,
        external_id: String,
        response: PaymentsResponseData,
    ) -> PaymentOutcome {
        match response.status {
            TransactionStatus::Success => PaymentOutcome::Success {
                external_id,
                payment_id: response.payment_id,
                receipt_url: response.receipt_url,
            },
            TransactionStatus::Failure => {
                let mut error = PaymentError::new(
                    ErrorCode::from_wire(response.status_code.as_deref()),
                    ErrorType::PaymentError,
                )
                .with_external_id(external_id);
                if let Some(description) = response.status_description {
                    error = error.with_message(description);
                }
                if let Some(payment_id) = response.payment_id {
                    error = error.with_payment_id(payment_id);
                }
                PaymentOutcome::Failed(error)
            }
            TransactionStatus::Start | TransactionStatus::Pending => match response.action {
                Some(NextAction::ConfirmationUrl(url)) => PaymentOutcome::ConfirmationRequired {
                    url,
                    callback_url: self.callback_url.clone(),
                },
                action => PaymentOutcome::Failed(
                    unknown_action_error(action).with_external_id(external_id),
                ),
            },
        }
    }

    fn classify_batch_created(
        &self,
        batch_external_id: String,
        response: BatchResponseData,
    ) -> BatchPaymentOutcome {
        match response.status {
            TransactionStatus::Success => BatchPaymentOutcome::Success {
                batch_external_id,
                orders: response.orders,
                receipt_url: response.receipt_url,
            },
            TransactionStatus::Failure => {
                let mut error = PaymentError::new(
                    ErrorCode::from_wire(response.status_code.as_deref()),
                    ErrorType::PaymentError,
                )
                .with_external_id(batch_external_id);
                if let Some(description) = response.status_description {
                    error = error.with_message(description);
                }
                BatchPaymentOutcome::Failed(error)
            }
            TransactionStatus::Start | TransactionStatus::Pending => match response.action {
                Some(NextAction::ConfirmationUrl(url)) => {
                    BatchPaymentOutcome::ConfirmationRequired {
                        url,
                        callback_url: self.callback_url.clone(),
                    }
                }
                action => BatchPaymentOutcome::Failed(
                    unknown_action_error(action).with_external_id(batch_external_id),
                ),
            },
        }
    }

    async fn poll_loop<F, Fut>(
        &self,
        mut probe: F,
        mut cancellation: Option<oneshot::Receiver<()>>,
    ) -> StatusOutcome
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = StatusOutcome>,
    {
        // Wall-clock deadline from the first attempt. An attempt in flight
        // when it passes is allowed to finish; no further attempt starts.
        let deadline = tokio::time::Instant::now() + self.config.poll.timeout;
        loop {
            let outcome = match with_cancellation(&mut cancellation, probe()).await {
                Some(outcome) => outcome,
                None => return StatusOutcome::Cancelled,
            };
            match outcome {
                StatusOutcome::Pending { .. } => {}
                StatusOutcome::Failed(ref error)
                    if error.code == ErrorCode::NetworkUnreachable =>
                {
                    tracing::warn!(error = %error, "transient network failure during status polling");
                }
                terminal => return terminal,
            }
            if tokio::time::Instant::now() >= deadline {
                return poll_timeout_outcome();
            }
            match with_cancellation(&mut cancellation, tokio::time::sleep(self.config.poll.delay))
                .await
            {
                Some(()) => {}
                None => return StatusOutcome::Cancelled,
            }
            if tokio::time::Instant::now() >= deadline {
                return poll_timeout_outcome();
            }
        }
    }
}

/// Runs `operation` unless the cancellation signal fires first. `None` means
/// the operation was cancelled; the in-flight future is dropped on the spot.
async fn with_cancellation<T>(
    cancellation: &mut Option<oneshot::Receiver<()>>,
    operation: impl std::future::Future<Output = T>,
) -> Option<T> {
    let Some(mut receiver) = cancellation.take() else {
        return Some(operation.await);
    };
    tokio::pin!(operation);
    tokio::select! {
        result = &mut receiver => match result {
            Ok(()) => None,
            // The caller dropped the handle without firing it; from here on
            // the operation is not cancellable.
            Err(_) => Some(operation.await),
        },
        output = &mut operation => {
            *cancellation = Some(receiver);
            Some(output)
        }
    }
}

fn classify_payment_sync(external_id: &str, response: PaymentsSyncResponseData) -> StatusOutcome {
    let last = response.purchases.last();
    match response.status {
        TransactionStatus::Success => StatusOutcome::Complete {
            payment_id: last.and_then(|purchase| purchase.payment_id.clone()),
            external_id: response.external_id,
            receipt_url: response.receipt_url,
        },
        TransactionStatus::Failure => {
            let mut error = PaymentError::new(
                ErrorCode::from_wire(last.and_then(|purchase| purchase.status_code.as_deref())),
                ErrorType::PaymentError,
            )
            .with_external_id(external_id);
            if let Some(description) = last.and_then(|purchase| purchase.status_description.clone())
            {
                error = error.with_message(description);
            }
            if let Some(payment_id) = last.and_then(|purchase| purchase.payment_id.clone()) {
                error = error.with_payment_id(payment_id);
            }
            StatusOutcome::Failed(error)
        }
        TransactionStatus::Start | TransactionStatus::Pending => StatusOutcome::Pending {
            message: last
                .and_then(|purchase| purchase.status_description.clone())
                .unwrap_or_else(|| consts::PENDING_MESSAGE.to_string()),
            error: None,
        },
    }
}

fn classify_batch_sync(batch_external_id: &str, response: BatchSyncResponseData) -> StatusOutcome {
    match response.status {
        TransactionStatus::Success => StatusOutcome::Complete {
            external_id: batch_external_id.to_string(),
            payment_id: None,
            receipt_url: None,
        },
        TransactionStatus::Failure => {
            let mut error = PaymentError::new(
                ErrorCode::from_wire(response.status_code.as_deref()),
                ErrorType::PaymentError,
            )
            .with_external_id(batch_external_id);
            if let Some(description) = response.status_description {
                error = error.with_message(description);
            }
            StatusOutcome::Failed(error)
        }
        TransactionStatus::Start | TransactionStatus::Pending => StatusOutcome::Pending {
            message: response
                .status_description
                .unwrap_or_else(|| consts::PENDING_MESSAGE.to_string()),
            error: None,
        },
    }
}

fn poll_timeout_outcome() -> StatusOutcome {
    StatusOutcome::Pending {
        message: consts::POLL_TIMEOUT_MESSAGE.to_string(),
        error: Some(PaymentError::poll_timeout()),
    }
}

fn unknown_action_error(action: Option<NextAction>) -> PaymentError {
    let message = match action {
        Some(NextAction::Undefined { name, value }) => {
            format!("The gateway requested an unsupported action: {name}={value}")
        }
        Some(NextAction::ConfirmationUrl(url)) => {
            format!("The gateway requested an unexpected confirmation: {url}")
        }
        None => "The gateway returned a non-terminal status without a follow-up action".to_string(),
    };
    PaymentError::new(
        ErrorCode::Unknown("unknown_action".to_string()),
        ErrorType::ApiError,
    )
    .with_message(message)
}

/// Maps pipeline-internal failures onto the unified taxonomy. Every variant
/// gets its own arm: a new failure shape must be classified here, never
/// swallowed by a fallthrough.
fn connector_failure_error(report: &error_stack::Report<ConnectorError>) -> PaymentError {
    match report.current_context() {
        ConnectorError::ResponseDeserializationFailed => PaymentError::new(
            ErrorCode::from_wire(None),
            ErrorType::from_wire(None),
        )
        .with_message(format!("The gateway response could not be decoded: {report}")),
        ConnectorError::InvalidWalletToken { .. } => {
            PaymentError::new(ErrorCode::InvalidRequest, ErrorType::TokenizationError)
                .with_message(report.to_string())
        }
        ConnectorError::FailedToObtainAuthType
        | ConnectorError::RequestEncodingFailed
        | ConnectorError::MissingRequiredField { .. } => {
            PaymentError::new(ErrorCode::InvalidRequest, ErrorType::ApiError)
                .with_message(report.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PaymentsClient {
        PaymentsClient::new(GatewayConfig::new(
            "https://api.gateway.example",
            "https://merchant.example/callback",
        ))
        .unwrap()
    }

    fn created(status: TransactionStatus, action: Option<NextAction>) -> PaymentsResponseData {
        PaymentsResponseData {
            status,
            payment_id: Some("pay_1".to_string()),
            action,
            status_code: None,
            status_description: None,
            receipt_url: None,
        }
    }

    #[test]
    fn success_status_completes_immediately() {
        let outcome =
            client().classify_payment_created("ord-1".to_string(), created(TransactionStatus::Success, None));
        assert_eq!(
            outcome,
            PaymentOutcome::Success {
                external_id: "ord-1".to_string(),
                payment_id: Some("pay_1".to_string()),
                receipt_url: None,
            }
        );
    }

    #[test]
    fn pending_with_confirmation_url_awaits_confirmation() {
        let url = Url::parse("https://acs.bank.example/challenge").unwrap();
        let outcome = client().classify_payment_created(
            "ord-1".to_string(),
            created(
                TransactionStatus::Pending,
                Some(NextAction::ConfirmationUrl(url.clone())),
            ),
        );
        assert_eq!(
            outcome,
            PaymentOutcome::ConfirmationRequired {
                url,
                callback_url: Url::parse("https://merchant.example/callback").unwrap(),
            }
        );
    }

    #[test]
    fn pending_without_a_known_action_fails() {
        let outcome = client().classify_payment_created(
            "ord-1".to_string(),
            created(
                TransactionStatus::Pending,
                Some(NextAction::Undefined {
                    name: "sms_otp".to_string(),
                    value: "123".to_string(),
                }),
            ),
        );
        match outcome {
            PaymentOutcome::Failed(error) => {
                assert_eq!(error.code, ErrorCode::Unknown("unknown_action".to_string()));
                assert_eq!(error.external_id.as_deref(), Some("ord-1"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn failure_status_carries_the_gateway_code() {
        let response = PaymentsResponseData {
            status: TransactionStatus::Failure,
            payment_id: Some("pay_1".to_string()),
            action: None,
            status_code: Some("insufficient_funds".to_string()),
            status_description: Some("Not enough funds".to_string()),
            receipt_url: None,
        };
        match client().classify_payment_created("ord-1".to_string(), response) {
            PaymentOutcome::Failed(error) => {
                assert_eq!(error.code, ErrorCode::InsufficientFunds);
                assert_eq!(error.message.as_deref(), Some("Not enough funds"));
                assert_eq!(error.external_id.as_deref(), Some("ord-1"));
                assert_eq!(error.payment_id.as_deref(), Some("pay_1"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn sync_failure_uses_the_most_recent_purchase() {
        let response = PaymentsSyncResponseData {
            external_id: "ord-1".to_string(),
            status: TransactionStatus::Failure,
            purchases: vec![crate::types::PurchaseOutcome {
                payment_id: Some("pay_9".to_string()),
                status: TransactionStatus::Failure,
                status_code: Some("wrong_cvv".to_string()),
                status_description: Some("Wrong CVV2".to_string()),
            }],
            receipt_url: None,
        };
        match classify_payment_sync("ord-1", response) {
            StatusOutcome::Failed(error) => {
                assert_eq!(error.code, ErrorCode::WrongCvv);
                assert_eq!(error.payment_id.as_deref(), Some("pay_9"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancellation_wins_over_a_slow_operation() {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let mut cancellation = Some(cancel_rx);
        cancel_tx.send(()).unwrap();
        let result = with_cancellation(
            &mut cancellation,
            tokio::time::sleep(std::time::Duration::from_secs(30)),
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn dropped_cancellation_handle_disables_cancellation() {
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        drop(cancel_tx);
        let mut cancellation = Some(cancel_rx);
        let result = with_cancellation(&mut cancellation, async { 7 }).await;
        assert_eq!(result, Some(7));
    }
}
