use reqwest::Client;
use serde_json::{json, Value};
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::models::{BookingStatus, Listing, PersistedBooking};
use crate::repository::{ReservationStore, Store};

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";
const EMAIL_WRAPPER_STYLE: &str = "font-family: sans-serif; max-width: 600px; margin: 0 auto;";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Fire-and-forget booking emails. Failures are logged, never returned.
#[derive(Debug, Clone)]
pub struct Notifier {
    http_client: Client,
    resend_api_key: Option<String>,
    from_address: String,
    operations_email: Option<String>,
}

impl Notifier {
    pub fn from_config(config: &AppConfig, http_client: Client) -> Self {
        Self {
            http_client,
            resend_api_key: config.resend_api_key.clone(),
            from_address: config.email_from_address.clone(),
            operations_email: config.operations_email.clone(),
        }
    }

    pub fn dispatch_booking_created(
        &self,
        store: Store,
        booking: PersistedBooking,
    ) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            let listing = match store.get_listing(booking.booking.listing_id).await {
                Ok(listing) => Some(listing),
                Err(error) => {
                    tracing::warn!(
                        booking_id = %booking.id,
                        error = %error,
                        "Listing lookup for notifications failed"
                    );
                    None
                }
            };
            let operations_email = notifier.operations_email.as_deref();
            for message in booking_messages(&booking, listing.as_ref(), operations_email) {
                if let Err(error) = notifier.send_email(&message).await {
                    tracing::warn!(
                        booking_id = %booking.id,
                        recipient = %message.to,
                        error = %error,
                        "Booking notification failed"
                    );
                }
            }
        })
    }

    async fn send_email(&self, message: &EmailMessage) -> Result<Option<Value>, String> {
        let Some(api_key) = self.resend_api_key.as_deref().filter(|key| !key.is_empty()) else {
            tracing::debug!(
                recipient = %message.to,
                subject = %message.subject,
                "RESEND_API_KEY not configured, skipping email"
            );
            return Ok(None);
        };

        let payload = json!({
            "from": self.from_address,
            "to": [message.to],
            "subject": message.subject,
            "html": format!("<div style=\"{EMAIL_WRAPPER_STYLE}\">{}</div>", message.html),
        });

        let response = self
            .http_client
            .post(RESEND_EMAILS_URL)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Resend API request failed");
                "Resend API request failed.".to_string()
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .unwrap_or(json!({"error": "failed to parse response"}));

        if status.is_success() {
            Ok(Some(body))
        } else {
            let error_msg = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown Resend API error");
            Err(format!("Resend API error ({status}): {error_msg}"))
        }
    }
}

/// Guest confirmation, operations alert and host alert for a new booking.
pub fn booking_messages(
    booking: &PersistedBooking,
    listing: Option<&Listing>,
    operations_email: Option<&str>,
) -> Vec<EmailMessage> {
    let details = &booking.booking;
    let title = listing
        .map(|listing| listing.title.as_str())
        .unwrap_or("your stay");
    let title_html = escape_html(title);
    let guest_name_html = escape_html(&details.guest.full_name);
    let summary = format!(
        "<p><strong>{title_html}</strong><br>{} to {} &middot; {} guest(s)</p>\
         <p>{} &middot; total {} {}</p>",
        details.check_in,
        details.check_out,
        details.guests,
        escape_html(&details.pricing.label),
        details.pricing.total,
        escape_html(&details.pricing.currency),
    );

    let guest_subject = match details.status {
        BookingStatus::Confirmed => format!("Your booking at {title} is confirmed"),
        _ => format!("We received your booking request for {title}"),
    };

    let mut messages = vec![EmailMessage {
        to: details.guest.email.clone(),
        subject: guest_subject,
        html: format!(
            "<p>Hi {guest_name_html},</p>{summary}<p>Reference: {}</p>",
            booking.id
        ),
    }];

    if let Some(operations) = operations_email.filter(|address| !address.trim().is_empty()) {
        messages.push(EmailMessage {
            to: operations.to_string(),
            subject: format!("New {} booking {}", details.status, booking.id),
            html: summary.clone(),
        });
    }

    if let Some(host) = listing
        .and_then(|listing| listing.host_email.as_deref())
        .filter(|address| !address.trim().is_empty())
    {
        let action = if details.status == BookingStatus::Pending {
            "Please review and confirm this request."
        } else {
            "No action needed, the booking was confirmed instantly."
        };
        messages.push(EmailMessage {
            to: host.to_string(),
            subject: format!("New booking for {title}"),
            html: format!("{summary}<p>Guest: {guest_name_html}</p><p>{action}</p>"),
        });
    }

    messages
}

/// Guest-supplied text is interpolated into email HTML; never let it become markup.
fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
