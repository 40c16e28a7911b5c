//! BDD step definitions for what the user sees

use std::time::Duration;

use cucumber::then;

use smartqueue_client::view::{StatusSlot, Tone};

use crate::world::QueueWorld;

const WAIT: Duration = Duration::from_secs(2);

fn parse_slot(s: &str) -> StatusSlot {
    match s {
        "customer" => StatusSlot::Customer,
        "serve" => StatusSlot::Serve,
        "duration" => StatusSlot::Duration,
        "hours" => StatusSlot::Hours,
        other => panic!("Unknown status slot: {}", other),
    }
}

fn parse_tone(s: &str) -> Tone {
    match s {
        "success" => Tone::Success,
        "error" => Tone::Error,
        "info" => Tone::Info,
        other => panic!("Unknown tone: {}", other),
    }
}

#[then(expr = "the {word} status should read {string} in {word} tone")]
fn status_reads(world: &mut QueueWorld, slot: String, text: String, tone: String) {
    let status = world
        .view
        .status(parse_slot(&slot))
        .unwrap_or_else(|| panic!("no {} status shown", slot));
    assert_eq!(status.text, text);
    assert_eq!(status.tone, parse_tone(&tone));
}

#[then(expr = "no {word} status should be shown")]
fn status_empty(world: &mut QueueWorld, slot: String) {
    assert_eq!(world.view.status(parse_slot(&slot)), None);
}

#[then(expr = "the {word} status should eventually be cleared")]
async fn status_cleared(world: &mut QueueWorld, slot: String) {
    let slot = parse_slot(&slot);
    assert!(
        world
            .view
            .wait_until(WAIT, |v| v.status(slot).is_none())
            .await,
        "status {:?} still shows {:?}",
        slot,
        world.view.status(slot)
    );
}

#[then(expr = "after {int} ms the {word} status should still read {string}")]
async fn status_stays(world: &mut QueueWorld, millis: u64, slot: String, text: String) {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    let status = world.view.status(parse_slot(&slot));
    assert_eq!(status.map(|s| s.text), Some(text));
}

#[then(expr = "an alert should say {string}")]
async fn alert_says(world: &mut QueueWorld, message: String) {
    let expected = message.clone();
    assert!(
        world
            .view
            .wait_until(WAIT, move |v| v.alerts().contains(&expected))
            .await,
        "alerts: {:?}",
        world.view.alerts()
    );
}

#[then("no alert should be shown")]
fn no_alert(world: &mut QueueWorld) {
    assert!(world.view.alerts().is_empty(), "alerts: {:?}", world.view.alerts());
}

#[then(expr = "the queue table should show {int} row(s)")]
fn table_rows(world: &mut QueueWorld, count: usize) {
    assert_eq!(world.view.rows().len(), count, "rows: {:?}", world.view.rows());
}

#[then(expr = "row {int} of the queue table should be {string} on {string} at {string}")]
fn table_row(world: &mut QueueWorld, index: usize, name: String, date: String, time: String) {
    let rows = world.view.rows();
    let row = &rows[index - 1];
    assert_eq!(row.name.as_deref().unwrap_or("-"), name);
    assert_eq!(row.date, date);
    assert_eq!(row.time, time);
}

#[then("the queue table should not have been replaced")]
fn table_untouched(world: &mut QueueWorld) {
    assert_eq!(world.view.table_replacements(), 0);
}
