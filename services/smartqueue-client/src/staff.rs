//! Staff dashboard
//!
//! The queue table is reloaded after every successful serve and on every
//! broadcast received on the queue-update channel. Duration and hours
//! statuses clear themselves after a delay unless something newer has been
//! written to the same status line in the meantime.
//!
//! The employee API sits behind the server's login form. Requests made
//! without a signed-in session come back as a redirect to the login page,
//! which is treated like a 403.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::api::{self, Endpoints, QueueEntry};
use crate::config::{StaffCredentials, StatusConfig};
use crate::io::{HttpClient, HttpResponse};
use crate::subscription::{Listener, Subscriber};
use crate::view::{QueueRow, Status, StatusSlot, View};
use crate::QueueError;

pub const UNAUTHORIZED_ALERT: &str =
    "Session expired or unauthorized. Please refresh and log in again.";
pub const SERVE_NETWORK_ERROR: &str = "Network error: Could not reach the server.";
pub const CONNECTION_ERROR: &str = "Connection error";
pub const DURATION_FAILED: &str = "✕ Update failed";

/// Loads the full queue into the view
///
/// Shared with the broadcast listener so it does not keep the client alive.
struct QueueTable {
    http: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    view: Arc<dyn View>,
}

impl QueueTable {
    async fn reload(&self) {
        let response = match self.http.get(&self.endpoints.full_queue()).await {
            Ok(response) => response,
            Err(e) => {
                error!("Error loading queue: {}", e);
                return;
            }
        };

        if response.needs_sign_in() {
            warn!("Full queue refused with status {}", response.status);
            self.view.alert(UNAUTHORIZED_ALERT);
            return;
        }
        if !response.is_success() {
            warn!("Loading queue failed with status {}", response.status);
            return;
        }

        match serde_json::from_str::<Vec<QueueEntry>>(&response.body) {
            Ok(entries) => {
                debug!("Queue holds {} appointments", entries.len());
                let rows = entries
                    .into_iter()
                    .map(|entry| QueueRow {
                        name: Some(entry.name),
                        date: entry.date,
                        time: api::format_hour(entry.hour),
                    })
                    .collect();
                self.view.replace_queue(rows);
            }
            Err(e) => warn!("Unreadable queue response: {}", e),
        }
    }
}

/// Status lines with a write counter each, so a delayed clear only removes
/// the message it was scheduled for
#[derive(Clone)]
struct StatusLines {
    view: Arc<dyn View>,
    generations: Arc<Mutex<HashMap<StatusSlot, u64>>>,
}

impl StatusLines {
    fn generations(&self) -> MutexGuard<'_, HashMap<StatusSlot, u64>> {
        self.generations.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn show(&self, slot: StatusSlot, status: Status) -> u64 {
        let generation = {
            let mut generations = self.generations();
            let generation = generations.entry(slot).or_insert(0);
            *generation += 1;
            *generation
        };
        self.view.show_status(slot, status);
        generation
    }

    /// Show `status`, then clear it after `delay` if it is still the latest
    fn show_for(&self, slot: StatusSlot, status: Status, delay: Duration) {
        let generation = self.show(slot, status);
        let lines = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let current = lines.generations().get(&slot).copied();
            if current == Some(generation) {
                lines.view.clear_status(slot);
            } else {
                debug!("Skipping clear of {:?}, newer status shown", slot);
            }
        });
    }
}

/// Client behind the staff dashboard
pub struct StaffClient {
    http: Arc<dyn HttpClient>,
    endpoints: Endpoints,
    subscriber: Arc<dyn Subscriber>,
    table: Arc<QueueTable>,
    status: StatusLines,
    timing: StatusConfig,
    live: Mutex<Option<Listener>>,
}

impl StaffClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        endpoints: Endpoints,
        view: Arc<dyn View>,
        subscriber: Arc<dyn Subscriber>,
        timing: StatusConfig,
    ) -> Self {
        let table = Arc::new(QueueTable {
            http: Arc::clone(&http),
            endpoints: endpoints.clone(),
            view: Arc::clone(&view),
        });
        Self {
            http,
            endpoints,
            subscriber,
            table,
            status: StatusLines {
                view,
                generations: Arc::new(Mutex::new(HashMap::new())),
            },
            timing,
            live: Mutex::new(None),
        }
    }

    fn live(&self) -> MutexGuard<'_, Option<Listener>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Sign in through the server's login form
    ///
    /// The HTTP client keeps the session cookie the server hands out and
    /// sends it with every later employee request.
    pub async fn sign_in(&self, credentials: &StaffCredentials) -> crate::Result<()> {
        let response = self
            .http
            .post_form(
                &self.endpoints.login(),
                &[
                    ("username", credentials.username.as_str()),
                    ("password", credentials.password.as_str()),
                ],
            )
            .await?;

        let rejected = response
            .location
            .as_deref()
            .is_some_and(|location| location.contains("error"));
        if rejected || !(response.is_success() || response.is_redirect()) {
            warn!(
                "Login for {} refused with status {}",
                credentials.username, response.status
            );
            return Err(QueueError::SignIn(format!(
                "server refused login for {:?}",
                credentials.username
            )));
        }

        info!("Signed in as {}", credentials.username);
        Ok(())
    }

    /// A redirect from an employee endpoint leads to the login page
    fn redirected_to_login(&self, action: &str, response: &HttpResponse) {
        warn!(
            "{} redirected to {:?}, not signed in",
            action, response.location
        );
        self.status.view.alert(UNAUTHORIZED_ALERT);
    }

    /// Fetch the full queue and replace the table
    pub async fn load_full_queue(&self) {
        self.table.reload().await;
    }

    /// Reload the table on every queue-update broadcast
    ///
    /// Must be called from within a tokio runtime. Calling it again while
    /// live updates are running has no effect.
    pub fn start_live_updates(&self) {
        let mut live = self.live();
        if live.as_ref().is_some_and(|listener| !listener.is_finished()) {
            debug!("Live updates already running");
            return;
        }

        let subscription = self.subscriber.subscribe(api::QUEUE_UPDATE_TOPIC);
        let table = Arc::clone(&self.table);
        *live = Some(Listener::spawn(subscription, move |body| {
            let table = Arc::clone(&table);
            async move {
                debug!("Queue update broadcast: {}", body);
                table.reload().await;
            }
        }));
        info!("Listening for queue updates on {}", api::QUEUE_UPDATE_TOPIC);
    }

    pub fn stop_live_updates(&self) {
        if self.live().take().is_some() {
            info!("Stopped listening for queue updates");
        }
    }

    pub fn live_updates_running(&self) -> bool {
        self.live()
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Serve the next customer and reload the table on success
    pub async fn serve_next(&self) {
        match self.http.delete(&self.endpoints.serve()).await {
            Ok(response) if response.is_success() => {
                info!("Served: {}", response.body);
                self.status
                    .show(StatusSlot::Serve, Status::success(response.body));
                self.load_full_queue().await;
            }
            Ok(response) if response.is_redirect() => {
                self.redirected_to_login("Serve", &response);
            }
            Ok(response) => {
                self.status
                    .show(StatusSlot::Serve, Status::error(response.body));
            }
            Err(e) => {
                error!("Serve request failed: {}", e);
                self.status
                    .show(StatusSlot::Serve, Status::error(SERVE_NETWORK_ERROR));
            }
        }
    }

    /// Set the per-appointment duration; `minutes` is forwarded unvalidated
    pub async fn update_duration(&self, minutes: &str) {
        match self.http.post(&self.endpoints.duration(minutes)).await {
            Ok(response) if response.is_success() => {
                info!("Appointment duration set to {} minutes", minutes);
                self.status.show_for(
                    StatusSlot::Duration,
                    Status::success(format!("✓ Set to {}m", minutes)),
                    Duration::from_millis(self.timing.duration_clear_ms),
                );
            }
            Ok(response) if response.is_redirect() => {
                self.redirected_to_login("Duration update", &response);
            }
            Ok(response) => {
                warn!("Duration update failed with status {}", response.status);
                self.status
                    .show(StatusSlot::Duration, Status::error(DURATION_FAILED));
            }
            Err(e) => {
                error!("Duration request failed: {}", e);
                self.status
                    .show(StatusSlot::Duration, Status::error(CONNECTION_ERROR));
            }
        }
    }

    /// Set the opening hours; both values are forwarded unvalidated
    pub async fn update_service_hours(&self, open_hour: &str, close_hour: &str) {
        let delay = Duration::from_millis(self.timing.hours_clear_ms);
        match self
            .http
            .post(&self.endpoints.hours(open_hour, close_hour))
            .await
        {
            Ok(response) if response.is_success() => {
                self.status.show_for(
                    StatusSlot::Hours,
                    Status::success(format!("✓ {}", response.body)),
                    delay,
                );
            }
            Ok(response) if response.is_redirect() => {
                self.redirected_to_login("Hours update", &response);
            }
            Ok(response) => {
                self.status.show_for(
                    StatusSlot::Hours,
                    Status::error(format!("✕ {}", response.body)),
                    delay,
                );
            }
            Err(e) => {
                error!("Hours request failed: {}", e);
                self.status
                    .show(StatusSlot::Hours, Status::error(CONNECTION_ERROR));
            }
        }
    }
}
