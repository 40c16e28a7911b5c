//! BDD test world for the SmartQueue client

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cucumber::World;
use tokio::sync::mpsc;

use smartqueue_client::api::Endpoints;
use smartqueue_client::config::StatusConfig;
use smartqueue_client::io::{HttpClient, HttpResponse};
use smartqueue_client::session::{MemorySessionStore, SessionStore};
use smartqueue_client::subscription::{ChannelEvent, Subscriber, Subscription};
use smartqueue_client::view::{MemoryView, View};
use smartqueue_client::{CustomerClient, QueueError, StaffClient};

pub const BASE_URL: &str = "http://queue.test";

/// Canned answer for one endpoint
#[derive(Debug, Clone)]
pub enum Reply {
    Respond { status: u16, body: String },
    /// 302 to the given location, as a form-login server sends
    Redirect { location: String },
    Unreachable,
}

/// A request the fake server received
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub url: String,
    pub body: Option<serde_json::Value>,
}

/// HTTP client answering from per-path scripts
///
/// The last reply scripted for a path is repeated once the script runs out.
#[derive(Debug, Default)]
pub struct FakeServer {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeServer {
    pub fn script(&self, path: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| path_of(&r.url) == path)
            .collect()
    }

    fn answer(
        &self,
        method: &'static str,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> smartqueue_client::Result<HttpResponse> {
        self.requests.lock().unwrap().push(Recorded {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });

        let path = path_of(url);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            match replies.get_mut(&path) {
                Some(script) if script.len() > 1 => script.pop_front(),
                Some(script) => script.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Respond { status, body }) => Ok(HttpResponse {
                status,
                body,
                location: None,
            }),
            Some(Reply::Redirect { location }) => Ok(HttpResponse {
                status: 302,
                body: String::new(),
                location: Some(location),
            }),
            Some(Reply::Unreachable) => {
                Err(QueueError::Http(format!("{} {} failed: connection refused", method, url)))
            }
            None => Ok(HttpResponse {
                status: 404,
                body: format!("No route for {}", path),
                location: None,
            }),
        }
    }
}

fn path_of(url: &str) -> String {
    let without_base = url.strip_prefix(BASE_URL).unwrap_or(url);
    without_base
        .split('?')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl HttpClient for FakeServer {
    async fn get(&self, url: &str) -> smartqueue_client::Result<HttpResponse> {
        self.answer("GET", url, None)
    }

    async fn post(&self, url: &str) -> smartqueue_client::Result<HttpResponse> {
        self.answer("POST", url, None)
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> smartqueue_client::Result<HttpResponse> {
        self.answer("POST", url, Some(body))
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> smartqueue_client::Result<HttpResponse> {
        let form: serde_json::Map<String, serde_json::Value> = params
            .iter()
            .map(|(key, value)| (key.to_string(), serde_json::Value::from(*value)))
            .collect();
        self.answer("POST", url, Some(&serde_json::Value::Object(form)))
    }

    async fn delete(&self, url: &str) -> smartqueue_client::Result<HttpResponse> {
        self.answer("DELETE", url, None)
    }

    async fn delete_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> smartqueue_client::Result<HttpResponse> {
        self.answer("DELETE", url, Some(body))
    }
}

/// Subscriber whose channels are fed by the steps
#[derive(Debug, Default)]
pub struct ManualSubscriber {
    opened: Mutex<Vec<(String, mpsc::Sender<ChannelEvent>)>>,
}

impl ManualSubscriber {
    pub fn topics(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Sender of the most recent subscription to `topic`
    pub fn sender(&self, topic: &str) -> mpsc::Sender<ChannelEvent> {
        self.opened
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _)| t == topic)
            .map(|(_, tx)| tx.clone())
            .unwrap_or_else(|| panic!("no subscription to {}", topic))
    }
}

impl Subscriber for ManualSubscriber {
    fn subscribe(&self, topic: &str) -> Subscription {
        let (subscription, tx) = Subscription::manual(topic);
        self.opened.lock().unwrap().push((topic.to_string(), tx));
        subscription
    }
}

#[derive(World)]
#[world(init = Self::new)]
pub struct QueueWorld {
    pub server: Arc<FakeServer>,
    pub session: Arc<MemorySessionStore>,
    pub view: Arc<MemoryView>,
    pub subscriber: Arc<ManualSubscriber>,
    pub status_timing: StatusConfig,
    /// Outcome of the last staff sign-in, error rendered as text
    pub sign_in: Option<Result<(), String>>,
    customer: Option<CustomerClient>,
    staff: Option<StaffClient>,
}

impl std::fmt::Debug for QueueWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueWorld")
            .field("requests", &self.server.requests())
            .field("topics", &self.subscriber.topics())
            .finish()
    }
}

impl QueueWorld {
    fn new() -> Self {
        Self {
            server: Arc::new(FakeServer::default()),
            session: Arc::new(MemorySessionStore::new()),
            view: Arc::new(MemoryView::new()),
            subscriber: Arc::new(ManualSubscriber::default()),
            status_timing: StatusConfig::default(),
            sign_in: None,
            customer: None,
            staff: None,
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints::new(BASE_URL).expect("valid base url")
    }

    /// Customer client, created on first use
    pub fn customer(&mut self) -> &CustomerClient {
        let server = Arc::clone(&self.server);
        let session = Arc::clone(&self.session);
        let view = Arc::clone(&self.view);
        let subscriber = Arc::clone(&self.subscriber);
        self.customer.get_or_insert_with(|| {
            CustomerClient::new(
                server as Arc<dyn HttpClient>,
                Self::endpoints(),
                session as Arc<dyn SessionStore>,
                view as Arc<dyn View>,
                subscriber as Arc<dyn Subscriber>,
            )
        })
    }

    /// Simulate a page reload: a fresh customer client on the same session
    pub fn restart_customer(&mut self) -> &CustomerClient {
        self.customer = None;
        self.customer()
    }

    /// Staff client, created on first use
    pub fn staff(&mut self) -> &StaffClient {
        let server = Arc::clone(&self.server);
        let view = Arc::clone(&self.view);
        let subscriber = Arc::clone(&self.subscriber);
        let timing = self.status_timing.clone();
        self.staff.get_or_insert_with(|| {
            StaffClient::new(
                server as Arc<dyn HttpClient>,
                Self::endpoints(),
                view as Arc<dyn View>,
                subscriber as Arc<dyn Subscriber>,
                timing,
            )
        })
    }

    pub fn stored_appointment(&self) -> Option<String> {
        self.session
            .active_appointment()
            .expect("memory session readable")
    }
}
