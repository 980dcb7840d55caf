use crate::core::config::{UpdateDataType, UpdateMethod};
use crate::core::dispatch::{
    ResponseBody, Result, TransportError, UpdateRequest, UpdateResponse, UpdateTransport,
};
use async_trait::async_trait;
use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder};
use url::form_urlencoded;

const DEFAULT_USER_AGENT: &str = "view-tracker";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// The http transport which delivers the tracking updates through [reqwest].
///
/// Updates sent with [UpdateMethod::Get] carry the report within the query string,
/// all other methods send the report as form encoded body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(Self::create_new_client())
    }

    /// Create a new transport which uses the given client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn create_request(&self, request: &UpdateRequest) -> RequestBuilder {
        let params = request.report.as_params();

        match request.method {
            UpdateMethod::Get => {
                let mut url = request.url.clone();
                url.query_pairs_mut().extend_pairs(params.iter());
                self.client.get(url)
            }
            method => {
                let body = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(params.iter())
                    .finish();

                self.client
                    .request(Self::as_method(method), request.url.clone())
                    .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                    .body(body)
            }
        }
    }

    fn parse_body(data_type: UpdateDataType, body: String) -> Result<ResponseBody> {
        match data_type {
            UpdateDataType::Json => serde_json::from_str(body.as_str())
                .map(ResponseBody::Json)
                .map_err(|e| TransportError::Parsing(e.to_string())),
            UpdateDataType::Text => Ok(ResponseBody::Text(body)),
        }
    }

    fn as_method(method: UpdateMethod) -> Method {
        match method {
            UpdateMethod::Get => Method::GET,
            UpdateMethod::Post => Method::POST,
            UpdateMethod::Put => Method::PUT,
            UpdateMethod::Patch => Method::PATCH,
        }
    }

    fn create_new_client() -> Client {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_else(|e| {
                debug!("Failed to create the http client with default headers, {}", e);
                Client::new()
            })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpdateTransport for HttpTransport {
    async fn send(&self, request: UpdateRequest) -> Result<UpdateResponse> {
        trace!("Sending update request {}", request);
        let response = self
            .create_request(&request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        if !status.is_success() {
            debug!("Collector rejected update {} with status {}", request, status);
            return Err(TransportError::Status(status.as_u16(), body));
        }

        debug!("Collector accepted update {} with status {}", request, status);
        Ok(UpdateResponse {
            status: status.as_u16(),
            body: Self::parse_body(request.data_type, body)?,
        })
    }
}
