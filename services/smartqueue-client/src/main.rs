//! SmartQueue CLI
//!
//! Command-line front end for customers and staff of the SmartQueue service.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use smartqueue_client::session::{FileSessionStore, SessionStore};
use smartqueue_client::view::{TerminalView, View};
use smartqueue_client::{load_config, BookingForm, Config};
use tracing::Level;

#[derive(Parser)]
#[command(name = "smartqueue")]
#[command(about = "Customer and staff client for the SmartQueue appointment service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server base URL (overrides config file)
    #[arg(long)]
    server: Option<String>,

    /// File holding the customer's active appointment (overrides config file)
    #[arg(long)]
    session_file: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    #[command(subcommand)]
    role: Role,
}

#[derive(Subcommand)]
enum Role {
    /// Book and track an appointment
    #[command(subcommand)]
    Customer(CustomerAction),
    /// Work the queue
    #[command(subcommand)]
    Staff(StaffAction),
}

#[derive(Subcommand)]
enum CustomerAction {
    /// Book an appointment
    Book {
        #[command(flatten)]
        slot: SlotArgs,
        #[arg(long)]
        name: String,
        /// Stay connected and wait to be called
        #[arg(long)]
        wait: bool,
    },
    /// Cancel the active appointment
    Cancel,
    /// Estimated wait for a slot
    WaitTime {
        #[command(flatten)]
        slot: SlotArgs,
    },
    /// Position of the active appointment
    Position,
    /// Show the anonymised queue
    Queue,
    /// Wait to be called for the active appointment
    Listen,
}

#[derive(ClapArgs)]
struct SlotArgs {
    /// Appointment date, e.g. 2026-10-20
    #[arg(long)]
    date: String,
    /// Appointment hour, e.g. 14
    #[arg(long)]
    hour: String,
}

#[derive(Subcommand)]
enum StaffAction {
    /// Show the full queue
    Queue,
    /// Serve the next customer
    Serve,
    /// Set the appointment duration
    Duration {
        #[arg(long)]
        minutes: String,
    },
    /// Set the service hours
    Hours {
        #[arg(long)]
        open: String,
        #[arg(long)]
        close: String,
    },
    /// Show the queue and keep it up to date
    Watch,
}

async fn run_customer(
    config: &Config,
    view: Arc<dyn View>,
    action: CustomerAction,
) -> smartqueue_client::Result<()> {
    let path = config.session.resolved_path();
    tracing::debug!("Session file: {:?}", path);
    let session: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(path));
    let client = smartqueue_client::customer_client(config, view, session)?;

    match action {
        CustomerAction::Book { slot, name, wait } => {
            client
                .book(&BookingForm::new(&name, &slot.date, &slot.hour))
                .await;
            if wait && client.notification_topic().is_some() {
                println!("Waiting to be called, press Ctrl-C to stop.");
                tokio::signal::ctrl_c().await?;
            }
        }
        CustomerAction::Cancel => client.cancel().await,
        CustomerAction::WaitTime { slot } => client.check_wait_time(&slot.date, &slot.hour).await,
        CustomerAction::Position => client.check_position().await,
        CustomerAction::Queue => client.view_queue().await,
        CustomerAction::Listen => match client.resume() {
            Some(id) => {
                println!("Waiting to be called for appointment {}, press Ctrl-C to stop.", id);
                tokio::signal::ctrl_c().await?;
            }
            None => println!("You don't have an active appointment."),
        },
    }

    client.close_notifications();
    Ok(())
}

async fn run_staff(
    config: &Config,
    view: Arc<dyn View>,
    action: StaffAction,
) -> smartqueue_client::Result<()> {
    let client = smartqueue_client::staff_client(config, view).await?;

    match action {
        StaffAction::Queue => client.load_full_queue().await,
        StaffAction::Serve => client.serve_next().await,
        StaffAction::Duration { minutes } => client.update_duration(&minutes).await,
        StaffAction::Hours { open, close } => client.update_service_hours(&open, &close).await,
        StaffAction::Watch => {
            client.load_full_queue().await;
            client.start_live_updates();
            println!("Watching the queue, press Ctrl-C to stop.");
            tokio::signal::ctrl_c().await?;
            client.stop_live_updates();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, server={:?}, session_file={:?}, log_level={:?}",
        args.config,
        args.server,
        args.session_file,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(server) = args.server {
        config.server.base_url = server;
    }
    if let Some(session_file) = args.session_file {
        config.session.path = Some(session_file);
    }

    let view: Arc<dyn View> = Arc::new(TerminalView::new());
    match args.role {
        Role::Customer(action) => run_customer(&config, view, action).await?,
        Role::Staff(action) => run_staff(&config, view, action).await?,
    }

    Ok(())
}
