use std::sync::Arc;

use delivery_sync_engine::events::{DeliveryCompletedEvent, EventHandlers, EventHooks, RiderAssignedEvent};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Serialize;
use thiserror::Error;

use crate::config::NotifierConfig;

pub const NOTIFIER_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Could not initialize the notification client. {0}")]
    Initialization(String),
    #[error("Could not send the {channel} notification. {reason}")]
    DeliveryFailed { channel: NotificationChannel, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Push,
}

impl NotificationChannel {
    fn path(&self) -> &'static str {
        match self {
            Self::Email => "/notifications/email",
            Self::Push => "/notifications/push",
        }
    }
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::Push => write!(f, "push"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct VendorNotification<'a> {
    vendor_id: &'a str,
    title: &'a str,
    message: &'a str,
}

/// Sends notifications to vendors over email and push.
#[derive(Clone)]
pub struct VendorNotifier {
    base_url: String,
    client: Arc<Client>,
}

impl VendorNotifier {
    pub fn new(config: &NotifierConfig) -> Result<Self, NotifierError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
            .map_err(|e| NotifierError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifierError::Initialization(e.to_string()))?;
        Ok(Self { base_url: config.base_url.clone(), client: Arc::new(client) })
    }

    /// Sends the notification on every channel. Each channel is attempted even if another fails; the failures are
    /// returned so the caller can log them.
    pub async fn notify_vendor(&self, vendor_id: &str, title: &str, message: &str) -> Vec<NotifierError> {
        let notification = VendorNotification { vendor_id, title, message };
        let mut failures = Vec::new();
        for channel in [NotificationChannel::Email, NotificationChannel::Push] {
            if let Err(e) = self.send(channel, &notification).await {
                failures.push(e);
            }
        }
        failures
    }

    async fn send(
        &self,
        channel: NotificationChannel,
        notification: &VendorNotification<'_>,
    ) -> Result<(), NotifierError> {
        let url = format!("{}{}", self.base_url, channel.path());
        trace!("🔔️ Sending {channel} notification to vendor {}", notification.vendor_id);
        let response = self
            .client
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifierError::DeliveryFailed { channel, reason: e.to_string() })?;
        let status = response.status();
        if status.is_success() {
            debug!("🔔️ {channel} notification sent to vendor {}", notification.vendor_id);
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(NotifierError::DeliveryFailed { channel, reason: format!("Error {status}. {body}") })
        }
    }
}

/// The title and message for the vendor when a rider has been assigned to one of their orders.
pub fn rider_assigned_message(ev: &RiderAssignedEvent) -> (String, String) {
    let order_number = ev.order.order_number.as_str();
    let title = format!("Rider assigned to order {order_number}");
    let rider = match (&ev.delivery.rider_name, &ev.delivery.rider_phone) {
        (Some(name), Some(phone)) => format!("{name} ({phone})"),
        (Some(name), None) => name.clone(),
        (None, Some(phone)) => format!("A rider ({phone})"),
        (None, None) => "A rider".to_string(),
    };
    let message = format!("{rider} is on the way to collect order {order_number}. Please have it ready for pickup.");
    (title, message)
}

/// Assigns the vendor-facing event handlers.
///
/// 1. RiderAssignedEvent - the vendor is told that a rider is on the way, so that the order is ready for pickup.
///    Notifications are fire-and-forget. A failure is logged and never affects the delivery record.
/// 2. DeliveryCompletedEvent - logged for auditing.
pub fn create_notifier_event_handlers(config: &NotifierConfig) -> Result<EventHandlers, NotifierError> {
    let mut hooks = EventHooks::default();
    let notifier = VendorNotifier::new(config)?;
    hooks.on_rider_assigned(move |ev| {
        let (title, message) = rider_assigned_message(&ev);
        let vendor_id = ev.order.vendor_id;
        let order_number = ev.order.order_number;
        let notifier = notifier.clone();
        Box::pin(async move {
            let failures = notifier.notify_vendor(&vendor_id, &title, &message).await;
            if failures.is_empty() {
                info!("🔔️ Vendor {vendor_id} notified that a rider is on the way for order {order_number}");
            }
            for e in failures {
                warn!("🔔️ Vendor {vendor_id} was not notified about order {order_number}. {e}");
            }
        })
    });
    hooks.on_delivery_completed(|ev| {
        let DeliveryCompletedEvent { order, delivery } = ev;
        info!(
            "🔔️ Order {} for vendor {} has been delivered by {}. Courier id: {}",
            order.order_number,
            order.vendor_id,
            delivery.rider_name.as_deref().unwrap_or("an unnamed rider"),
            delivery.external_id.as_deref().unwrap_or("none")
        );
        Box::pin(async {})
    });
    Ok(EventHandlers::new(NOTIFIER_EVENT_BUFFER_SIZE, hooks))
}
