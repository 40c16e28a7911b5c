//! SmartQueue client - customer booking and staff dashboard
//!
//! Talks to the SmartQueue appointment service over HTTP and listens for
//! pushed notifications over STOMP on a WebSocket.

pub mod api;
pub mod config;
pub mod connection;
pub mod customer;
pub mod error;
pub mod io;
pub mod session;
pub mod staff;
pub mod stomp;
pub mod subscription;
pub mod view;

pub use config::{load_config, Config};
pub use customer::{BookingForm, CustomerClient};
pub use error::{QueueError, Result};
pub use staff::StaffClient;

use std::sync::Arc;

use crate::api::Endpoints;
use crate::connection::WebSocketConnectionFactory;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::session::SessionStore;
use crate::subscription::{StompSubscriber, Subscriber};
use crate::view::View;

/// Subscriber for the configured broker endpoint
pub fn stomp_subscriber(config: &Config) -> Result<Arc<dyn Subscriber>> {
    let url = config.server.websocket_url()?;
    tracing::debug!("Notification endpoint: {}", url);
    let subscriber = StompSubscriber::new(
        &url,
        config.notifications.clone(),
        Arc::new(WebSocketConnectionFactory::new()),
    )?;
    Ok(Arc::new(subscriber))
}

/// Customer client wired to the network
pub fn customer_client(
    config: &Config,
    view: Arc<dyn View>,
    session: Arc<dyn SessionStore>,
) -> Result<CustomerClient> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
    Ok(CustomerClient::new(
        http,
        Endpoints::new(config.server.http_base())?,
        session,
        view,
        stomp_subscriber(config)?,
    ))
}

/// Staff client wired to the network
///
/// Signs in through the server's login form when credentials are configured.
/// The session lives as long as the client.
pub async fn staff_client(config: &Config, view: Arc<dyn View>) -> Result<StaffClient> {
    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);
    let client = StaffClient::new(
        http,
        Endpoints::new(config.server.http_base())?,
        view,
        stomp_subscriber(config)?,
        config.status.clone(),
    );
    match &config.staff {
        Some(credentials) => client.sign_in(credentials).await?,
        None => tracing::warn!(
            "No staff credentials configured, employee endpoints will send you to the login page"
        ),
    }
    Ok(client)
}
