//! Wire types and endpoint URLs of the SmartQueue HTTP API
//!
//! These types mirror the JSON bodies the server sends and accepts. Plain-text
//! bodies (confirmations, validation errors, estimates) are never parsed; they
//! are shown to the user exactly as received.

use reqwest::Url;
use serde::{Deserialize, Serialize};

pub const BOOK_PATH: &str = "/api/customer/book";
pub const CANCEL_PATH: &str = "/api/customer/cancel";
pub const WAIT_TIME_PATH: &str = "/api/customer/wait-time";
pub const POSITION_PATH: &str = "/api/customer/position";
pub const CUSTOMER_QUEUE_PATH: &str = "/api/customer/queue";
pub const FULL_QUEUE_PATH: &str = "/api/employee/full-queue";
pub const SERVE_PATH: &str = "/api/employee/serve";
pub const DURATION_PATH: &str = "/api/employee/duration";
pub const HOURS_PATH: &str = "/api/employee/hours";
/// Form-login endpoint guarding the employee API
pub const LOGIN_PATH: &str = "/login";

/// Broadcast channel every staff dashboard listens on
pub const QUEUE_UPDATE_TOPIC: &str = "/topic/queue-update";

/// Personal channel the server uses to call a customer
pub fn notify_topic(appointment_id: &str) -> String {
    format!("/topic/notify/{}", appointment_id)
}

/// Appointment returned by a successful booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub hour: i32,
}

/// Body of a booking request
///
/// `hour` is `null` on the wire when the form value is not a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookRequest {
    pub name: String,
    pub date: String,
    pub hour: Option<i32>,
}

/// Body of a cancellation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelRequest {
    pub id: String,
}

/// One appointment in the staff view of the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub name: String,
    pub date: String,
    pub hour: i32,
}

/// One occupied slot in the anonymised customer view of the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSlot {
    pub date: String,
    pub hour: i32,
}

/// Format a 24-hour integer as `HH:00`
pub fn format_hour(hour: i32) -> String {
    format!("{:02}:00", hour)
}

/// Builds absolute URLs for every endpoint from the configured base URL
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
    prefix: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> crate::Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            crate::QueueError::Config(format!("Invalid base_url {:?}: {}", base_url, e))
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(crate::QueueError::Config(format!(
                "base_url must be http or https, got {:?}",
                base_url
            )));
        }
        let prefix = base.path().trim_end_matches('/').to_string();
        Ok(Self { base, prefix })
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        url.set_path(&format!("{}{}", self.prefix, path));
        url.set_query(None);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        url.to_string()
    }

    pub fn book(&self) -> String {
        self.url(BOOK_PATH, &[])
    }

    pub fn cancel(&self) -> String {
        self.url(CANCEL_PATH, &[])
    }

    pub fn wait_time(&self, date: &str, hour: &str) -> String {
        self.url(WAIT_TIME_PATH, &[("date", date), ("hour", hour)])
    }

    pub fn position(&self, id: &str) -> String {
        self.url(POSITION_PATH, &[("id", id)])
    }

    pub fn customer_queue(&self) -> String {
        self.url(CUSTOMER_QUEUE_PATH, &[])
    }

    pub fn full_queue(&self) -> String {
        self.url(FULL_QUEUE_PATH, &[])
    }

    pub fn serve(&self) -> String {
        self.url(SERVE_PATH, &[])
    }

    pub fn duration(&self, minutes: &str) -> String {
        self.url(DURATION_PATH, &[("minutes", minutes)])
    }

    pub fn hours(&self, open_hour: &str, close_hour: &str) -> String {
        self.url(
            HOURS_PATH,
            &[("openHour", open_hour), ("closeHour", close_hour)],
        )
    }

    pub fn login(&self) -> String {
        self.url(LOGIN_PATH, &[])
    }
}
