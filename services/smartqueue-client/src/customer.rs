//! Customer booking station
//!
//! Every action ends in exactly one view update. Three outcomes are possible:
//! a local refusal when no appointment is held, the server's text shown
//! verbatim, or the fixed network-error message when the request never
//! completed.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info, warn};

use crate::api::{self, Appointment, BookRequest, CancelRequest, Endpoints, QueueSlot};
use crate::io::{HttpClient, HttpResponse};
use crate::session::SessionStore;
use crate::subscription::{Listener, Subscriber};
use crate::view::{QueueRow, Status, StatusSlot, Tone, View};

pub const BOOKED_MESSAGE: &str = "Booked! Waiting for your turn...";
pub const NO_APPOINTMENT_TO_CANCEL: &str = "You don't have an active appointment to cancel.";
pub const NO_APPOINTMENT_TO_CHECK: &str = "You don't have an active appointment to check.";
pub const NETWORK_ERROR: &str = "Network error.";

/// Raw form fields, exactly as typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingForm {
    pub name: String,
    pub date: String,
    pub hour: String,
}

impl BookingForm {
    pub fn new(name: &str, date: &str, hour: &str) -> Self {
        Self {
            name: name.to_string(),
            date: date.to_string(),
            hour: hour.to_string(),
        }
    }

    /// Request body; the hour is read from its leading digits and becomes
    /// `null` when there are none
    pub fn to_request(&self) -> BookRequest {
        BookRequest {
            name: self.name.clone(),
            date: self.date.clone(),
            hour: leading_int(&self.hour),
        }
    }
}

/// Integer spelled by the leading sign and digits of `text`, after leading
/// whitespace. Anything from the first other character on is ignored, so
/// "14abc" and "14.5" both read as 14.
fn leading_int(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let sign_len = usize::from(text.starts_with(['+', '-']));
    let digits = text[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    text[..sign_len + digits].parse().ok()
}

/// Client behind the customer booking form
pub struct CustomerClient {
    http: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    session: Arc<dyn SessionStore>,
    view: Arc<dyn View>,
    subscriber: Arc<dyn Subscriber>,
    personal: Mutex<Option<Listener>>,
}

impl CustomerClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoints: Endpoints,
        session: Arc<dyn SessionStore>,
        view: Arc<dyn View>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Self {
        Self {
            http,
            endpoints,
            session,
            view,
            subscriber,
            personal: Mutex::new(None),
        }
    }

    fn personal(&self) -> MutexGuard<'_, Option<Listener>> {
        self.personal.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn show(&self, status: Status) {
        self.view.show_status(StatusSlot::Customer, status);
    }

    /// Stored appointment id; an unreadable session counts as none
    pub fn active_appointment(&self) -> Option<String> {
        match self.session.active_appointment() {
            Ok(id) => id,
            Err(e) => {
                warn!("Reading session failed: {}", e);
                None
            }
        }
    }

    /// Topic of the open personal notification channel, if any
    pub fn notification_topic(&self) -> Option<String> {
        self.personal()
            .as_ref()
            .map(|listener| listener.topic().to_string())
    }

    /// Start-up hook: re-attach to the stored appointment's channel
    ///
    /// Must be called from within a tokio runtime.
    pub fn resume(&self) -> Option<String> {
        let id = self.active_appointment()?;
        info!("Resuming notifications for appointment {}", id);
        self.open_notifications(&id);
        Some(id)
    }

    /// Subscribe to the personal channel of `id`, replacing any earlier one
    fn open_notifications(&self, id: &str) {
        let mut personal = self.personal();
        if let Some(previous) = personal.take() {
            debug!("Closing notifications on {}", previous.topic());
        }

        let subscription = self.subscriber.subscribe(&api::notify_topic(id));
        let view = Arc::clone(&self.view);
        *personal = Some(Listener::spawn(subscription, move |body| {
            let view = Arc::clone(&view);
            async move {
                info!("Notification received: {}", body);
                view.alert(&body);
            }
        }));
    }

    /// Close the personal notification channel
    pub fn close_notifications(&self) {
        if let Some(listener) = self.personal().take() {
            debug!("Closing notifications on {}", listener.topic());
        }
    }

    pub async fn book(&self, form: &BookingForm) {
        let body = match serde_json::to_value(form.to_request()) {
            Ok(body) => body,
            Err(e) => {
                error!("Encoding booking request failed: {}", e);
                self.show(Status::error(NETWORK_ERROR));
                return;
            }
        };

        let response = match self.http.post_json(&self.endpoints.book(), &body).await {
            Ok(response) => response,
            Err(e) => {
                error!("Booking request failed: {}", e);
                self.show(Status::error(NETWORK_ERROR));
                return;
            }
        };

        if !response.is_success() {
            self.show(Status::error(response.body));
            return;
        }

        match serde_json::from_str::<Appointment>(&response.body) {
            Ok(appointment) => {
                info!(
                    "Booked appointment {} for {} at {} {}",
                    appointment.id,
                    appointment.name,
                    appointment.date,
                    api::format_hour(appointment.hour)
                );
                if let Err(e) = self.session.set_active_appointment(&appointment.id) {
                    warn!("Storing appointment id failed: {}", e);
                }
                self.show(Status::success(BOOKED_MESSAGE));
                self.open_notifications(&appointment.id);
            }
            Err(_) => {
                debug!("Booking response is not an appointment, showing it as text");
                self.show(Status::success(response.body));
            }
        }
    }

    pub async fn cancel(&self) {
        let Some(id) = self.active_appointment() else {
            self.show(Status::error(NO_APPOINTMENT_TO_CANCEL));
            return;
        };

        let body = match serde_json::to_value(CancelRequest { id }) {
            Ok(body) => body,
            Err(e) => {
                error!("Encoding cancel request failed: {}", e);
                self.show(Status::error(NETWORK_ERROR));
                return;
            }
        };

        match self.http.delete_json(&self.endpoints.cancel(), &body).await {
            Ok(response) => {
                let success = response.is_success();
                self.show(verbatim(response, Tone::Success));
                if success {
                    if let Err(e) = self.session.clear() {
                        warn!("Clearing session failed: {}", e);
                    }
                    self.close_notifications();
                }
            }
            Err(e) => {
                error!("Cancel request failed: {}", e);
                self.show(Status::error(NETWORK_ERROR));
            }
        }
    }

    /// Estimated wait for a slot; date and hour are forwarded unvalidated
    pub async fn check_wait_time(&self, date: &str, hour: &str) {
        match self.http.get(&self.endpoints.wait_time(date, hour)).await {
            Ok(response) => self.show(verbatim(response, Tone::Info)),
            Err(e) => {
                error!("Wait time request failed: {}", e);
                self.show(Status::error(NETWORK_ERROR));
            }
        }
    }

    pub async fn check_position(&self) {
        let Some(id) = self.active_appointment() else {
            self.show(Status::error(NO_APPOINTMENT_TO_CHECK));
            return;
        };

        match self.http.get(&self.endpoints.position(&id)).await {
            Ok(response) => self.show(verbatim(response, Tone::Info)),
            Err(e) => {
                error!("Position request failed: {}", e);
                self.show(Status::error(NETWORK_ERROR));
            }
        }
    }

    /// Replace the table with the anonymised queue
    pub async fn view_queue(&self) {
        let response = match self.http.get(&self.endpoints.customer_queue()).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error loading queue: {}", e);
                return;
            }
        };
        if !response.is_success() {
            warn!("Loading queue failed with status {}", response.status);
            return;
        }

        match serde_json::from_str::<Vec<QueueSlot>>(&response.body) {
            Ok(slots) => {
                let rows = slots
                    .into_iter()
                    .map(|slot| QueueRow {
                        name: None,
                        date: slot.date,
                        time: api::format_hour(slot.hour),
                    })
                    .collect();
                self.view.replace_queue(rows);
            }
            Err(e) => warn!("Unreadable queue response: {}", e),
        }
    }
}

/// Server text as-is, error-toned when the status is not 2xx
fn verbatim(response: HttpResponse, success_tone: Tone) -> Status {
    let tone = if response.is_success() {
        success_tone
    } else {
        Tone::Error
    };
    Status {
        text: response.body,
        tone,
    }
}
