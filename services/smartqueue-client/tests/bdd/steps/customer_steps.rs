//! BDD step definitions for the customer booking features

use cucumber::gherkin::Step;
use cucumber::{given, then, when};
use serde_json::json;

use smartqueue_client::api;
use smartqueue_client::session::SessionStore;
use smartqueue_client::subscription::ChannelEvent;
use smartqueue_client::BookingForm;

use crate::world::{QueueWorld, Reply, BASE_URL};

#[given(expr = "the server answers {string} with status {int} and text {string}")]
fn server_answers(world: &mut QueueWorld, path: String, status: u16, body: String) {
    world.server.script(&path, Reply::Respond { status, body });
}

#[given(expr = "the server at {string} is unreachable")]
fn server_unreachable(world: &mut QueueWorld, path: String) {
    world.server.script(&path, Reply::Unreachable);
}

#[given(expr = "the server books appointment {string}")]
fn server_books(world: &mut QueueWorld, id: String) {
    let body = json!({"id": id, "name": "Ada", "date": "2026-10-20", "hour": 10}).to_string();
    world
        .server
        .script(api::BOOK_PATH, Reply::Respond { status: 200, body });
}

#[given("the anonymised queue holds:")]
fn anonymised_queue(world: &mut QueueWorld, step: &Step) {
    let table = step.table.as_ref().expect("queue table missing");
    let slots: Vec<serde_json::Value> = table
        .rows
        .iter()
        .skip(1)
        .map(|row| {
            json!({
                "date": row[0],
                "hour": row[1].parse::<i32>().expect("numeric hour"),
            })
        })
        .collect();
    world.server.script(
        api::CUSTOMER_QUEUE_PATH,
        Reply::Respond {
            status: 200,
            body: serde_json::Value::Array(slots).to_string(),
        },
    );
}

#[given(expr = "the session holds appointment {string}")]
fn session_holds(world: &mut QueueWorld, id: String) {
    world
        .session
        .set_active_appointment(&id)
        .expect("memory session writable");
}

#[given("no appointment is stored")]
fn no_appointment(world: &mut QueueWorld) {
    world.session.clear().expect("memory session writable");
}

#[when(expr = "the customer books {string} on {string} at hour {string}")]
async fn customer_books(world: &mut QueueWorld, name: String, date: String, hour: String) {
    let form = BookingForm::new(&name, &date, &hour);
    world.customer().book(&form).await;
}

#[when("the customer cancels")]
async fn customer_cancels(world: &mut QueueWorld) {
    world.customer().cancel().await;
}

#[when(expr = "the customer checks the wait time for {string} at hour {string}")]
async fn customer_wait_time(world: &mut QueueWorld, date: String, hour: String) {
    world.customer().check_wait_time(&date, &hour).await;
}

#[when("the customer checks their position")]
async fn customer_position(world: &mut QueueWorld) {
    world.customer().check_position().await;
}

#[when("the customer views the queue")]
async fn customer_views_queue(world: &mut QueueWorld) {
    world.customer().view_queue().await;
}

#[when("the customer page is reloaded")]
fn customer_page_reloaded(world: &mut QueueWorld) {
    world.restart_customer().resume();
}

#[when(expr = "the server notifies appointment {string} with {string}")]
async fn server_notifies(world: &mut QueueWorld, id: String, message: String) {
    world
        .subscriber
        .sender(&api::notify_topic(&id))
        .send(ChannelEvent::Message(message))
        .await
        .expect("notification channel open");
}

#[then(expr = "the stored appointment should be {string}")]
fn stored_appointment_is(world: &mut QueueWorld, id: String) {
    assert_eq!(world.stored_appointment(), Some(id));
}

#[then("no appointment should be stored")]
fn no_appointment_stored(world: &mut QueueWorld) {
    assert_eq!(world.stored_appointment(), None);
}

#[then(expr = "exactly one subscription to {string} should have been opened")]
fn one_subscription(world: &mut QueueWorld, topic: String) {
    let opened = world
        .subscriber
        .topics()
        .into_iter()
        .filter(|t| *t == topic)
        .count();
    assert_eq!(opened, 1, "subscriptions: {:?}", world.subscriber.topics());
}

#[then(expr = "the customer should be listening on {string}")]
fn customer_listening(world: &mut QueueWorld, topic: String) {
    assert_eq!(world.customer().notification_topic(), Some(topic));
}

#[then("the customer should not be listening for notifications")]
fn customer_not_listening(world: &mut QueueWorld) {
    assert_eq!(world.customer().notification_topic(), None);
}

#[then("no subscription should have been opened")]
fn no_subscription(world: &mut QueueWorld) {
    assert!(
        world.subscriber.topics().is_empty(),
        "subscriptions: {:?}",
        world.subscriber.topics()
    );
}

#[then("no request should have been sent")]
fn no_request(world: &mut QueueWorld) {
    assert!(
        world.server.requests().is_empty(),
        "requests: {:?}",
        world.server.requests()
    );
}

#[then(expr = "the last request should be {word} {string}")]
fn last_request(world: &mut QueueWorld, method: String, path_and_query: String) {
    let requests = world.server.requests();
    let last = requests.last().expect("no request sent");
    assert_eq!(last.method, method);
    assert_eq!(last.url, format!("{}{}", BASE_URL, path_and_query));
}

#[then(expr = "the booking request should carry name {string}, date {string} and hour {int}")]
fn booking_body(world: &mut QueueWorld, name: String, date: String, hour: i32) {
    let requests = world.server.requests_to(api::BOOK_PATH);
    let body = requests
        .last()
        .and_then(|r| r.body.clone())
        .expect("no booking body");
    assert_eq!(body, json!({"name": name, "date": date, "hour": hour}));
}

#[then("the booking request should carry a null hour")]
fn booking_null_hour(world: &mut QueueWorld) {
    let requests = world.server.requests_to(api::BOOK_PATH);
    let body = requests
        .last()
        .and_then(|r| r.body.clone())
        .expect("no booking body");
    assert_eq!(body["hour"], serde_json::Value::Null);
}

#[then(expr = "the cancel request should carry the id {string}")]
fn cancel_body(world: &mut QueueWorld, id: String) {
    let requests = world.server.requests_to(api::CANCEL_PATH);
    let last = requests.last().expect("no cancel request");
    assert_eq!(last.method, "DELETE");
    assert_eq!(last.body, Some(json!({"id": id})));
}
