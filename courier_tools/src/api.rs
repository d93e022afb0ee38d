use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::CourierConfig,
    data_objects::{CancelDeliveryRequest, CreateDeliveryRequest, CreateDeliveryResponse},
    CourierApiError,
    CourierStatusPayload,
    CourierStatusUpdate,
};

#[derive(Clone)]
pub struct CourierApi {
    config: CourierConfig,
    client: Arc<Client>,
}

impl CourierApi {
    pub fn new(config: CourierConfig) -> Result<Self, CourierApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Token {}", config.api_key.reveal()))
            .map_err(|e| CourierApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CourierApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Sends a REST request to the courier. Returns `Ok(None)` when the courier answers 404.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<Option<T>, CourierApiError> {
        let url = self.url(path);
        trace!("🛵️ Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("🛵️ REST query successful. {status}");
            let result = response.json::<T>().await.map_err(|e| CourierApiError::JsonError(e.to_string()))?;
            Ok(Some(result))
        } else if status == StatusCode::NOT_FOUND {
            debug!("🛵️ Courier returned 404 for {path}");
            Ok(None)
        } else {
            let message = response.text().await?;
            Err(CourierApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn create_delivery(
        &self,
        request: &CreateDeliveryRequest,
    ) -> Result<CreateDeliveryResponse, CourierApiError> {
        let order = &request.order_details.client_order_id;
        debug!("🛵️ Requesting a rider for order {order}");
        let raw = self
            .rest_query::<Value, _>(Method::POST, "/orders/", &[], Some(request))
            .await?
            .ok_or_else(|| CourierApiError::QueryError { status: 404, message: "Order endpoint not found".into() })?;
        let response = CreateDeliveryResponse::from_value(raw)?;
        info!("🛵️ Courier accepted delivery request for order {order}. Courier id: {}", response.external_id);
        Ok(response)
    }

    /// Fetches the current delivery state. `reference` is either the courier's id or our order number, depending on
    /// how the courier account is configured. `Ok(None)` means the courier has no record of the delivery.
    pub async fn track_delivery(&self, reference: &str) -> Result<Option<CourierStatusUpdate>, CourierApiError> {
        let path = format!("/orders/{reference}/track/");
        let Some(raw) = self.rest_query::<Value, ()>(Method::GET, &path, &[], None).await? else {
            return Ok(None);
        };
        if raw.is_null() {
            return Ok(None);
        }
        let update = CourierStatusPayload::from_value(raw)?.into_update();
        trace!("🛵️ Tracking result for {reference}: {update:?}");
        Ok(Some(update))
    }

    /// Asks the courier to cancel a delivery request. Returns whether the courier confirmed the cancellation.
    pub async fn cancel_delivery(&self, external_id: &str, reason: &str) -> Result<bool, CourierApiError> {
        let body = CancelDeliveryRequest { sfx_order_id: external_id.to_string(), cancel_reason: reason.to_string() };
        let result = self.rest_query::<Value, _>(Method::POST, "/orders/cancel/", &[], Some(body)).await?;
        let confirmed = result.as_ref().is_some_and(|v| {
            let status = v["status"].as_str().unwrap_or_default();
            v["is_cancelled"].as_bool().unwrap_or(false) ||
                status.eq_ignore_ascii_case("success") ||
                status.eq_ignore_ascii_case("cancelled")
        });
        if confirmed {
            info!("🛵️ Courier cancelled delivery {external_id}");
        } else {
            warn!("🛵️ Courier did not confirm cancellation of delivery {external_id}: {result:?}");
        }
        Ok(confirmed)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use dsync_common::Secret;

    use super::*;

    #[test]
    fn urls() {
        let config = CourierConfig {
            base_url: "https://courier.test/api/v2".into(),
            api_key: Secret::new("abc".to_string()),
            timeout: Duration::from_secs(1),
        };
        let api = CourierApi::new(config).unwrap();
        assert_eq!(api.url("/orders/"), "https://courier.test/api/v2/orders/");
    }

    #[test]
    fn bad_api_key_fails_initialization() {
        let config = CourierConfig { api_key: Secret::new("bad\nkey".to_string()), ..Default::default() };
        assert!(matches!(CourierApi::new(config), Err(CourierApiError::Initialization(_))));
    }
}
