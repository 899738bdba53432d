//! HTTP execution pipeline.
//!
//! One call in, one classified outcome out. Transport failures are folded
//! into the flow's error response rather than retried: retry policy, where it
//! exists at all, belongs to the lifecycle layer.

use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use error_stack::{report, ResultExt};
use once_cell::sync::OnceCell;

use crate::{
    configs::GatewayConfig,
    connector::{ConnectorIntegration, ErrorResponse, FlowData},
    consts,
    errors::{ApiClientError, ConnectorError, CustomResult},
    request::{Headers, Method, Request, RequestContent},
};

/// Raw HTTP response as handed to the response transformers.
#[derive(Clone, Debug)]
pub struct Response {
    pub headers: Option<http::HeaderMap>,
    pub response: bytes::Bytes,
    pub status_code: u16,
}

static HTTP_CLIENT: OnceCell<reqwest::Client> = OnceCell::new();

/// Returns the shared connection-pooled client. Stateless per request, so it
/// is safe for any number of concurrent operations.
fn get_client() -> CustomResult<reqwest::Client, ApiClientError> {
    Ok(HTTP_CLIENT
        .get_or_try_init(|| {
            reqwest::Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .change_context(ApiClientError::ClientConstructionFailed)
        })?
        .clone())
}

/// Drives one flow end to end: build the wire request, send it once,
/// classify the outcome and decode the declared response shape.
pub async fn execute_connector_processing_step<F, Req, Resp>(
    connector: &dyn ConnectorIntegration<F, Req, Resp>,
    req: &FlowData<F, Req, Resp>,
    config: &GatewayConfig,
) -> CustomResult<FlowData<F, Req, Resp>, ConnectorError>
where
    F: Clone + std::fmt::Debug,
    Req: Clone + std::fmt::Debug,
    Resp: Clone + std::fmt::Debug,
{
    let mut router_data = req.clone();
    let connector_request = connector.build_request(req, config)?;

    match connector_request {
        Some(request) => {
            let method = request.method;
            let url = request.url.clone();
            let response = call_connector_api(request).await;
            match response {
                Ok(body) => match body {
                    Ok(body) => {
                        let status_code = body.status_code;
                        let mut data = connector.handle_response(req, body)?;
                        data.http_status_code = Some(status_code);
                        Ok(data)
                    }
                    Err(body) => {
                        router_data.http_status_code = Some(body.status_code);
                        let error = connector.get_error_response(body)?;
                        tracing::info!(
                            code = %error.code,
                            status_code = error.status_code,
                            "gateway returned an error response"
                        );
                        router_data.response = Err(error);
                        Ok(router_data)
                    }
                },
                Err(error) => {
                    // No response at all. Surfaced to the caller as a
                    // classified network error; never retried at this layer.
                    tracing::warn!(?error, %url, %method, "transport failure while calling the gateway");
                    let status_code = if error.current_context().is_upstream_timeout() {
                        504
                    } else {
                        503
                    };
                    router_data.response = Err(ErrorResponse::network_unreachable(status_code));
                    Ok(router_data)
                }
            }
        }
        None => Ok(router_data),
    }
}

/// Sends the request and folds the HTTP status space into
/// success / error-response / transport-failure.
pub async fn call_connector_api(
    request: Request,
) -> CustomResult<Result<Response, Response>, ApiClientError> {
    let current_time = Instant::now();

    let response = send_request(request, None).await;

    let elapsed_time = current_time.elapsed();
    tracing::debug!(request_time = ?elapsed_time);

    handle_response(response).await
}

async fn send_request(
    request: Request,
    option_timeout_secs: Option<u64>,
) -> CustomResult<reqwest::Response, ApiClientError> {
    tracing::debug!(method = %request.method, url = %request.url, headers = ?request.headers, "outgoing gateway request");

    let url =
        reqwest::Url::parse(&request.url).change_context(ApiClientError::UrlEncodingFailed)?;
    let client = get_client()?;
    let headers = request.headers.construct_header_map()?;

    match request.method {
        Method::Get => client.get(url),
        Method::Post => {
            let client = client.post(url);
            match request.body {
                Some(RequestContent::Json(payload)) => client.json(&payload),
                None => client,
            }
        }
        Method::Put => client.put(url),
        Method::Delete => client.delete(url),
    }
    .headers(headers)
    .timeout(Duration::from_secs(
        option_timeout_secs.unwrap_or(consts::REQUEST_TIMEOUT_SECS),
    ))
    .send()
    .await
    .map_err(|error| {
        let api_error = match error {
            error if error.is_timeout() => ApiClientError::RequestTimeoutReceived,
            error if error.is_connect() => ApiClientError::ConnectionClosed,
            error => ApiClientError::RequestNotSent(error.to_string()),
        };
        report!(api_error)
    })
    .attach_printable("Unable to send request to the gateway")
}

async fn handle_response(
    response: CustomResult<reqwest::Response, ApiClientError>,
) -> CustomResult<Result<Response, Response>, ApiClientError> {
    response
        .map(|response| async {
            let status_code = response.status().as_u16();
            let headers = Some(response.headers().to_owned());
            match status_code {
                200..=202 | 204 => {
                    let response = response
                        .bytes()
                        .await
                        .change_context(ApiClientError::ResponseDecodingFailed)
                        .attach_printable("Error while waiting for response")?;
                    Ok(Ok(Response {
                        headers,
                        response,
                        status_code,
                    }))
                }
                400..=599 => {
                    let bytes = response
                        .bytes()
                        .await
                        .change_context(ApiClientError::ResponseDecodingFailed)
                        .attach_printable("Error response received")?;
                    Ok(Err(Response {
                        headers,
                        response: bytes,
                        status_code,
                    }))
                }
                _ => Err(report!(ApiClientError::UnexpectedServerResponse)
                    .attach_printable("Unexpected response from server")),
            }
        })?
        .await
}

pub(super) trait HeaderExt {
    fn construct_header_map(self) -> CustomResult<reqwest::header::HeaderMap, ApiClientError>;
}

impl HeaderExt for Headers {
    fn construct_header_map(self) -> CustomResult<reqwest::header::HeaderMap, ApiClientError> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        self.into_iter().try_fold(
            HeaderMap::new(),
            |mut header_map, (header_name, header_value)| {
                let header_name = HeaderName::from_str(&header_name)
                    .change_context(ApiClientError::HeaderMapConstructionFailed)?;
                let header_value = HeaderValue::from_str(&header_value.into_inner())
                    .change_context(ApiClientError::HeaderMapConstructionFailed)?;
                header_map.append(header_name, header_value);
                Ok(header_map)
            },
        )
    }
}
