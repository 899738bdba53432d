//! The gateway integration: one implementation of the request/response
//! contract per flow, plus the classified error response shared by all of
//! them.

pub mod transformers;

use std::marker::PhantomData;

use error_stack::ResultExt;
use masking::{Mask, Maskable};

use crate::{
    configs::GatewayConfig,
    crypto,
    errors::{ConnectorError, CustomResult, ErrorCode, ErrorType, PaymentError},
    ext_traits::BytesExt,
    request::{Method, Request, RequestBuilder, RequestContent},
    services::Response,
    types::{
        BatchAuthorizeData, BatchResponseData, BatchSyncData, BatchSyncResponseData,
        CardTokenizationData, ConnectorAuthType, PaymentsAuthorizeData, PaymentsResponseData,
        PaymentsSyncData, PaymentsSyncResponseData, TokenizedCard, TransactionStatus,
    },
};

pub(crate) mod headers {
    pub(crate) const CONTENT_TYPE: &str = "Content-Type";
    pub(crate) const X_API_KEY: &str = "X-Api-Key";
    pub(crate) const X_REQUEST_ID: &str = "X-Request-Id";
    pub(crate) const X_SIGNATURE: &str = "X-Signature";
}

/// Card tokenization flow
#[derive(Clone, Debug)]
pub struct Tokenize;

/// Single payment creation flow
#[derive(Clone, Debug)]
pub struct Authorize;

/// Single payment status flow
#[derive(Clone, Debug)]
pub struct PSync;

/// Batch payment creation flow
#[derive(Clone, Debug)]
pub struct BatchAuthorize;

/// Batch payment status flow
#[derive(Clone, Debug)]
pub struct BatchSync;

/// Per-operation state threaded through the pipeline. Constructed fresh for
/// every logical operation and discarded on return; nothing here is shared
/// between concurrent operations.
#[derive(Clone, Debug)]
pub struct FlowData<F, Req, Resp> {
    pub flow: PhantomData<F>,
    pub auth_type: ConnectorAuthType,
    pub external_id: Option<String>,
    pub payment_id: Option<String>,
    pub status: TransactionStatus,
    pub request: Req,
    pub response: Result<Resp, ErrorResponse>,
    pub http_status_code: Option<u16>,
}

impl<F, Req, Resp> FlowData<F, Req, Resp> {
    pub fn from_request(auth_type: ConnectorAuthType, request: Req) -> Self {
        Self {
            flow: PhantomData,
            auth_type,
            external_id: None,
            payment_id: None,
            status: TransactionStatus::Start,
            request,
            response: Err(ErrorResponse::default()),
            http_status_code: None,
        }
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }
}

/// A gateway failure classified into the unified taxonomy, retaining the
/// HTTP status it arrived with.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub status_code: u16,
    pub code: ErrorCode,
    pub error_type: ErrorType,
    pub message: Option<String>,
    pub reason: Option<String>,
    pub param: Option<String>,
    pub error_id: Option<String>,
    pub external_id: Option<String>,
    pub payment_id: Option<String>,
}

impl Default for ErrorResponse {
    fn default() -> Self {
        Self {
            status_code: 500,
            code: ErrorCode::from_wire(None),
            error_type: ErrorType::from_wire(None),
            message: None,
            reason: None,
            param: None,
            error_id: None,
            external_id: None,
            payment_id: None,
        }
    }
}

impl ErrorResponse {
    /// The classification applied when no HTTP response arrived at all.
    pub fn network_unreachable(status_code: u16) -> Self {
        Self {
            status_code,
            code: ErrorCode::NetworkUnreachable,
            error_type: ErrorType::NetworkError,
            message: Some(crate::consts::NETWORK_UNREACHABLE_MESSAGE.to_string()),
            ..Self::default()
        }
    }
}

impl From<ErrorResponse> for PaymentError {
    fn from(item: ErrorResponse) -> Self {
        Self {
            code: item.code,
            error_type: item.error_type,
            message: item.message,
            description: item.reason,
            external_id: item.external_id,
            payment_id: item.payment_id,
            param: item.param,
            error_id: item.error_id,
        }
    }
}

/// Behaviour shared by every flow of the gateway integration.
pub trait ConnectorCommon {
    /// Name of the integration (in lowercase).
    fn id(&self) -> &'static str;

    /// HTTP `Content-Type` used for POST requests.
    fn common_get_content_type(&self) -> &'static str {
        "application/json"
    }

    /// The base URL for interacting with the gateway API.
    fn base_url<'a>(&self, config: &'a GatewayConfig) -> &'a str;

    /// Headers carrying the caller's credential identifier.
    fn get_auth_header(
        &self,
        auth_type: &ConnectorAuthType,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError>;

    /// Classifies a non-2xx response body into the unified error shape.
    fn build_error_response(&self, res: Response) -> CustomResult<ErrorResponse, ConnectorError>;
}

/// One endpoint of the gateway, described declaratively: where it lives,
/// which headers it wants, what its request and response bodies look like.
pub trait ConnectorIntegration<F, Req, Resp>: ConnectorCommon + Sync {
    fn get_headers(
        &self,
        req: &FlowData<F, Req, Resp>,
        config: &GatewayConfig,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError>;

    fn get_content_type(&self) -> &'static str {
        mime::APPLICATION_JSON.essence_str()
    }

    fn get_http_method(&self) -> Method {
        Method::Post
    }

    fn get_url(
        &self,
        req: &FlowData<F, Req, Resp>,
        config: &GatewayConfig,
    ) -> CustomResult<String, ConnectorError>;

    fn get_request_body(
        &self,
        req: &FlowData<F, Req, Resp>,
        config: &GatewayConfig,
    ) -> CustomResult<RequestContent, ConnectorError>;

    fn build_request(
        &self,
        req: &FlowData<F, Req, Resp>,
        config: &GatewayConfig,
    ) -> CustomResult<Option<Request>, ConnectorError> {
        Ok(Some(
            RequestBuilder::new()
                .method(self.get_http_method())
                .url(&self.get_url(req, config)?)
                .headers(self.get_headers(req, config)?)
                .set_body(self.get_request_body(req, config)?)
                .build(),
        ))
    }

    fn handle_response(
        &self,
        data: &FlowData<F, Req, Resp>,
        res: Response,
    ) -> CustomResult<FlowData<F, Req, Resp>, ConnectorError>;

    fn get_error_response(&self, res: Response) -> CustomResult<ErrorResponse, ConnectorError> {
        self.build_error_response(res)
    }
}

/// The gateway integration itself. Stateless: configuration and credentials
/// arrive with each call.
#[derive(Clone, Debug)]
pub struct Gateway;

impl Gateway {
    pub fn new() -> &'static Self {
        &Self
    }

    /// Common headers for a signed JSON endpoint: content type, a fresh
    /// request id, the credential identifier and, for key-pair credentials,
    /// the body signature.
    fn build_signed_headers(
        &self,
        auth_type: &ConnectorAuthType,
        payload: &impl serde::Serialize,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        let mut headers = vec![
            (
                headers::CONTENT_TYPE.to_string(),
                self.common_get_content_type().to_string().into(),
            ),
            (
                headers::X_REQUEST_ID.to_string(),
                uuid::Uuid::new_v4().to_string().into(),
            ),
        ];
        headers.append(&mut self.get_auth_header(auth_type)?);

        if let ConnectorAuthType::SignatureKey { api_secret, .. } = auth_type {
            let signature = crypto::generate_signature(api_secret, payload)
                .change_context(ConnectorError::RequestEncodingFailed)?;
            headers.push((headers::X_SIGNATURE.to_string(), signature.into_masked()));
        }
        Ok(headers)
    }
}

impl ConnectorCommon for Gateway {
    fn id(&self) -> &'static str {
        "gateway"
    }

    fn base_url<'a>(&self, config: &'a GatewayConfig) -> &'a str {
        config.trimmed_base_url()
    }

    fn get_auth_header(
        &self,
        auth_type: &ConnectorAuthType,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        let api_key = match auth_type {
            ConnectorAuthType::HeaderKey { api_key } => api_key,
            ConnectorAuthType::SignatureKey { api_key, .. } => api_key,
        };
        Ok(vec![(
            headers::X_API_KEY.to_string(),
            api_key.clone().into_masked(),
        )])
    }

    fn build_error_response(&self, res: Response) -> CustomResult<ErrorResponse, ConnectorError> {
        match res
            .response
            .parse_struct::<transformers::GatewayErrorResponse>("GatewayErrorResponse")
        {
            Ok(response) => Ok(ErrorResponse {
                status_code: res.status_code,
                code: ErrorCode::from_wire(response.code.as_deref()),
                error_type: ErrorType::from_wire(response.error_type.as_deref()),
                message: response.message,
                reason: response.description,
                param: response.param,
                error_id: response.error_id,
                external_id: response.external_id,
                payment_id: response.payment_id,
            }),
            Err(error) => {
                // Non-2xx without a structured body: fall back to the HTTP
                // status as the error code, keeping any raw text the server
                // sent.
                tracing::warn!(?error, status_code = res.status_code, "undecodable gateway error body");
                Ok(ErrorResponse {
                    status_code: res.status_code,
                    code: ErrorCode::Unknown(res.status_code.to_string()),
                    error_type: ErrorType::PaymentError,
                    message: String::from_utf8(res.response.to_vec())
                        .ok()
                        .filter(|text| !text.trim().is_empty()),
                    ..ErrorResponse::default()
                })
            }
        }
    }
}

impl ConnectorIntegration<Tokenize, CardTokenizationData, TokenizedCard> for Gateway {
    fn get_headers(
        &self,
        req: &FlowData<Tokenize, CardTokenizationData, TokenizedCard>,
        _config: &GatewayConfig,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        // Raw card data may only travel under a signing credential.
        if !matches!(req.auth_type, ConnectorAuthType::SignatureKey { .. }) {
            return Err(ConnectorError::FailedToObtainAuthType.into());
        }
        let body = transformers::TokenizeRequest::try_from(req)?;
        self.build_signed_headers(&req.auth_type, &body)
    }

    fn get_url(
        &self,
        _req: &FlowData<Tokenize, CardTokenizationData, TokenizedCard>,
        config: &GatewayConfig,
    ) -> CustomResult<String, ConnectorError> {
        Ok(format!("{}/tokens", self.base_url(config)))
    }

    fn get_request_body(
        &self,
        req: &FlowData<Tokenize, CardTokenizationData, TokenizedCard>,
        _config: &GatewayConfig,
    ) -> CustomResult<RequestContent, ConnectorError> {
        let connector_req = transformers::TokenizeRequest::try_from(req)?;
        Ok(RequestContent::Json(Box::new(connector_req)))
    }

    fn handle_response(
        &self,
        data: &FlowData<Tokenize, CardTokenizationData, TokenizedCard>,
        res: Response,
    ) -> CustomResult<FlowData<Tokenize, CardTokenizationData, TokenizedCard>, ConnectorError> {
        let response: transformers::TokenizeResponse = res
            .response
            .parse_struct("TokenizeResponse")
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        Ok(FlowData {
            status: TransactionStatus::Success,
            response: Ok(TokenizedCard::from(response)),
            ..data.clone()
        })
    }
}

impl ConnectorIntegration<Authorize, PaymentsAuthorizeData, PaymentsResponseData> for Gateway {
    fn get_headers(
        &self,
        req: &FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        let body = transformers::PaymentsRequest::try_from(req)?;
        self.build_signed_headers(&req.auth_type, &body)
    }

    fn get_url(
        &self,
        _req: &FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>,
        config: &GatewayConfig,
    ) -> CustomResult<String, ConnectorError> {
        Ok(format!("{}/payments", self.base_url(config)))
    }

    fn get_request_body(
        &self,
        req: &FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<RequestContent, ConnectorError> {
        let connector_req = transformers::PaymentsRequest::try_from(req)?;
        Ok(RequestContent::Json(Box::new(connector_req)))
    }

    fn handle_response(
        &self,
        data: &FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>,
        res: Response,
    ) -> CustomResult<FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData>, ConnectorError>
    {
        let response: transformers::PaymentsResponse = res
            .response
            .parse_struct("PaymentsResponse")
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        let response_data = PaymentsResponseData::from(response);
        Ok(FlowData {
            status: response_data.status,
            payment_id: response_data.payment_id.clone(),
            response: Ok(response_data),
            ..data.clone()
        })
    }
}

impl ConnectorIntegration<PSync, PaymentsSyncData, PaymentsSyncResponseData> for Gateway {
    fn get_headers(
        &self,
        req: &FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        let body = transformers::PaymentsSyncRequest::from(req);
        self.build_signed_headers(&req.auth_type, &body)
    }

    fn get_url(
        &self,
        _req: &FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>,
        config: &GatewayConfig,
    ) -> CustomResult<String, ConnectorError> {
        Ok(format!("{}/payments/status", self.base_url(config)))
    }

    fn get_request_body(
        &self,
        req: &FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<RequestContent, ConnectorError> {
        let connector_req = transformers::PaymentsSyncRequest::from(req);
        Ok(RequestContent::Json(Box::new(connector_req)))
    }

    fn handle_response(
        &self,
        data: &FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>,
        res: Response,
    ) -> CustomResult<FlowData<PSync, PaymentsSyncData, PaymentsSyncResponseData>, ConnectorError>
    {
        let response: transformers::PaymentsSyncResponse = res
            .response
            .parse_struct("PaymentsSyncResponse")
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        let response_data = PaymentsSyncResponseData::from(response);
        Ok(FlowData {
            status: response_data.status,
            payment_id: response_data
                .purchases
                .last()
                .and_then(|purchase| purchase.payment_id.clone()),
            response: Ok(response_data),
            ..data.clone()
        })
    }
}

impl ConnectorIntegration<BatchAuthorize, BatchAuthorizeData, BatchResponseData> for Gateway {
    fn get_headers(
        &self,
        req: &FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        let body = transformers::BatchPaymentsRequest::try_from(req)?;
        self.build_signed_headers(&req.auth_type, &body)
    }

    fn get_url(
        &self,
        _req: &FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>,
        config: &GatewayConfig,
    ) -> CustomResult<String, ConnectorError> {
        Ok(format!("{}/payments/batch", self.base_url(config)))
    }

    fn get_request_body(
        &self,
        req: &FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<RequestContent, ConnectorError> {
        let connector_req = transformers::BatchPaymentsRequest::try_from(req)?;
        Ok(RequestContent::Json(Box::new(connector_req)))
    }

    fn handle_response(
        &self,
        data: &FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>,
        res: Response,
    ) -> CustomResult<FlowData<BatchAuthorize, BatchAuthorizeData, BatchResponseData>, ConnectorError>
    {
        let response: transformers::BatchPaymentsResponse = res
            .response
            .parse_struct("BatchPaymentsResponse")
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        let response_data = BatchResponseData::from(response);
        Ok(FlowData {
            status: response_data.status,
            response: Ok(response_data),
            ..data.clone()
        })
    }
}

impl ConnectorIntegration<BatchSync, BatchSyncData, BatchSyncResponseData> for Gateway {
    fn get_headers(
        &self,
        req: &FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<Vec<(String, Maskable<String>)>, ConnectorError> {
        let body = transformers::BatchSyncRequest::from(req);
        self.build_signed_headers(&req.auth_type, &body)
    }

    fn get_url(
        &self,
        _req: &FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>,
        config: &GatewayConfig,
    ) -> CustomResult<String, ConnectorError> {
        Ok(format!("{}/payments/batch/status", self.base_url(config)))
    }

    fn get_request_body(
        &self,
        req: &FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>,
        _config: &GatewayConfig,
    ) -> CustomResult<RequestContent, ConnectorError> {
        let connector_req = transformers::BatchSyncRequest::from(req);
        Ok(RequestContent::Json(Box::new(connector_req)))
    }

    fn handle_response(
        &self,
        data: &FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>,
        res: Response,
    ) -> CustomResult<FlowData<BatchSync, BatchSyncData, BatchSyncResponseData>, ConnectorError>
    {
        let response: transformers::BatchSyncResponse = res
            .response
            .parse_struct("BatchSyncResponse")
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        let response_data = BatchSyncResponseData::from(response);
        Ok(FlowData {
            status: response_data.status,
            response: Ok(response_data),
            ..data.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use masking::Secret;

    use super::*;
    use crate::types::{Amount, Currency, MinorUnit, PaymentInstrument};

    fn authorize_flow_data(
        auth_type: ConnectorAuthType,
    ) -> FlowData<Authorize, PaymentsAuthorizeData, PaymentsResponseData> {
        FlowData::from_request(
            auth_type,
            PaymentsAuthorizeData {
                amount: Amount::new(MinorUnit::new(10_000), None, None, Currency::UAH),
                external_id: "ord-1".to_string(),
                description: None,
                customer: None,
                instrument: PaymentInstrument::CardToken(Secret::new("tok_1".to_string())),
            },
        )
    }

    #[test]
    fn signature_key_credentials_produce_a_signature_header() {
        let flow_data = authorize_flow_data(ConnectorAuthType::SignatureKey {
            api_key: Secret::new("merchant_1".to_string()),
            api_secret: Secret::new("secret".to_string()),
        });
        let config = GatewayConfig::new("https://api.gateway.example", "https://merchant.example/cb");
        let headers = Gateway::new().get_headers(&flow_data, &config).unwrap();
        let names: Vec<&str> = headers.iter().map(|(name, _)| name.as_str()).collect();
        assert!(names.contains(&headers::X_SIGNATURE));
        assert!(names.contains(&headers::X_API_KEY));
        assert!(names.contains(&headers::X_REQUEST_ID));
    }

    #[test]
    fn header_key_credentials_do_not_sign() {
        let flow_data = authorize_flow_data(ConnectorAuthType::HeaderKey {
            api_key: Secret::new("merchant_1".to_string()),
        });
        let config = GatewayConfig::new("https://api.gateway.example", "https://merchant.example/cb");
        let headers = Gateway::new().get_headers(&flow_data, &config).unwrap();
        assert!(!headers.iter().any(|(name, _)| name == headers::X_SIGNATURE));
    }

    #[test]
    fn undecodable_error_body_falls_back_to_http_status() {
        let res = Response {
            headers: None,
            response: bytes::Bytes::from_static(b"upstream exploded"),
            status_code: 502,
        };
        let error = Gateway::new().build_error_response(res).unwrap();
        assert_eq!(error.code, ErrorCode::Unknown("502".to_string()));
        assert_eq!(error.error_type, ErrorType::PaymentError);
        assert_eq!(error.message.as_deref(), Some("upstream exploded"));
    }

    #[test]
    fn decodable_error_body_is_passed_through() {
        let res = Response {
            headers: None,
            response: bytes::Bytes::from_static(
                br#"{"code": "wrong_cvv", "type": "payment_error", "message": "Wrong CVV2"}"#,
            ),
            status_code: 422,
        };
        let error = Gateway::new().build_error_response(res).unwrap();
        assert_eq!(error.code, ErrorCode::WrongCvv);
        assert_eq!(error.error_type, ErrorType::PaymentError);
        assert_eq!(error.message.as_deref(), Some("Wrong CVV2"));
        assert_eq!(error.status_code, 422);
    }
}
