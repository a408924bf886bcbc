// src/cli.rs
//
// Terminal front end over the storefront client.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use thiserror::Error;

use nyamix_tickets::AppState;
use nyamix_tickets::api::auth::{AuthError, LoginRequest, ProfileUpdate, SignupRequest};
use nyamix_tickets::api::client::ApiError;
use nyamix_tickets::catalog;
use nyamix_tickets::config::{AppConfig, ConfigError};
use nyamix_tickets::models::{Event, TicketId};
use nyamix_tickets::purchase::{PurchaseError, PurchaseFlow};
use nyamix_tickets::refresh::Settlement;
use nyamix_tickets::session::{Session, SessionError};
use nyamix_tickets::tickets::{TicketDisplay, TicketError, TicketView};

#[derive(Debug, Parser)]
#[command(
    name = "nyamix",
    version,
    about = "Browse NyamiX events and buy tickets with mobile money"
)]
pub struct Cli {
    /// Backend base URL, overrides NYAMIX_API_BASE_URL.
    #[arg(short = 'a', long, global = true)]
    pub api_url: Option<String>,

    /// Where the login token is kept between runs.
    #[arg(long, global = true, env = "NYAMIX_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "NYAMIX_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signup {
        #[arg(long)]
        email: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "NYAMIX_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Show the signed-in account.
    Whoami,
    Categories,
    /// List upcoming events, optionally for one category.
    Events {
        #[arg(short, long)]
        category: Option<u64>,
    },
    /// Show one event and its ticket types.
    Event { id: u64 },
    /// Buy tickets and request the mobile-money payment.
    Buy {
        #[arg(short, long)]
        event: u64,
        #[arg(short, long)]
        ticket_type: u64,
        #[arg(
            short,
            long,
            default_value_t = 1,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        quantity: u32,
        #[arg(long)]
        phone: String,
    },
    /// List your tickets.
    Tickets,
    /// Request payment again for a ticket whose payment failed.
    Retry {
        #[arg(short, long)]
        ticket: String,
        /// Defaults to the phone stored on the ticket.
        #[arg(long)]
        phone: Option<String>,
        /// Block until the status changes or the refresh attempts run out.
        #[arg(short, long)]
        wait: bool,
    },
    /// Update profile details.
    Profile {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        phone: String,
        /// YYYY-MM-DD
        #[arg(long)]
        date_of_birth: Option<NaiveDate>,
        #[arg(long)]
        avatar: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Purchase(#[from] PurchaseError),

    #[error("{0}")]
    Ticket(#[from] TicketError),

    #[error("{0}")]
    NotFound(String),

    #[error("Please log in first (nyamix login)")]
    NotLoggedIn,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::NotLoggedIn | CliError::Purchase(PurchaseError::AuthenticationRequired) => 3,
            CliError::Api(e) if e.is_timeout() => 4,
            _ => 1,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

pub async fn run(cli: Cli) -> CliResult<()> {
    let mut config = AppConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }
    config.session_file = cli.session_file.or(config.session_file).or_else(default_session_file);

    let session = match &config.session_file {
        Some(path) => Session::persistent(path)?,
        None => Session::in_memory(),
    };
    let state = AppState::new(config, session)?;

    match cli.command {
        Commands::Login { username, password } => {
            let resp = state.auth.login(&LoginRequest { username, password }).await?;
            match resp.user {
                Some(user) => println!("Logged in as {}", user.username),
                None => println!("Logged in"),
            }
        }
        Commands::Signup {
            email,
            username,
            password,
        } => {
            let user = state
                .auth
                .signup(&SignupRequest {
                    email,
                    username,
                    password,
                })
                .await?;
            println!("Account created for {}. You can now log in.", user.username);
        }
        Commands::Logout => {
            state.auth.logout();
            println!("Logged out");
        }
        Commands::Whoami => {
            require_login(&state)?;
            let user = state.auth.me().await?;
            println!("{} <{}>", user.username, user.email);
        }
        Commands::Categories => {
            for category in state.events.categories().await? {
                println!("{:>4}  {}", category.id, category.name);
            }
        }
        Commands::Events { category } => {
            let events = match category {
                Some(id) => state.events.events_by_category(id).await?,
                None => state.events.home_events().await?,
            };
            if events.is_empty() {
                println!("No events found");
            }
            for event in &events {
                print_event_line(event);
            }
        }
        Commands::Event { id } => {
            let event = find_event(&state, id).await?;
            print_event_detail(&state, &event);
        }
        Commands::Buy {
            event,
            ticket_type,
            quantity,
            phone,
        } => {
            require_login(&state)?;
            let event = find_event(&state, event).await?;
            let mut flow = PurchaseFlow::for_event(&event);
            flow.select_ticket_type(ticket_type);
            flow.request_quantity(quantity)?;
            flow.set_phone(phone);

            let outcome = flow.submit(&state.events, &state.session).await?;
            println!("Ticket {} created", outcome.ticket_id);
            println!(
                "Payment of K{} requested on {}.",
                outcome.amount.normalize(),
                outcome.phone
            );
            println!("Approve it on your phone, then run `nyamix tickets`.");
        }
        Commands::Tickets => {
            require_login(&state)?;
            let board = state.ticket_board();
            board.refresh().await?;
            let views = board.views().await;
            if views.is_empty() {
                println!("You have no tickets yet");
            }
            for view in &views {
                print_ticket(view);
            }
            let summary = board.summary().await;
            println!(
                "\n{} ticket(s): {} ready, {} processing, {} need payment",
                summary.total, summary.redeemable, summary.processing, summary.retryable
            );
        }
        Commands::Retry {
            ticket,
            phone,
            wait,
        } => {
            require_login(&state)?;
            let board = state.ticket_board();
            board.refresh().await?;
            let scheduled = board
                .retry_payment(&TicketId::from(ticket.as_str()), phone.as_deref())
                .await?;
            println!("Payment requested for ticket {}", scheduled.ticket_id);
            if wait {
                match scheduled.wait().await {
                    Settlement::Settled(TicketDisplay::Redeemable { secret_code }) => {
                        println!("Payment complete. Redemption code: {secret_code}")
                    }
                    Settlement::Settled(TicketDisplay::RetryPayment) => {
                        println!("Payment failed. You can retry again.")
                    }
                    Settlement::Settled(display) => println!("Ticket is now {display:?}"),
                    Settlement::Unsettled => {
                        println!("Payment still processing. Check again with `nyamix tickets`.")
                    }
                }
            }
        }
        Commands::Profile {
            first_name,
            last_name,
            phone,
            date_of_birth,
            avatar,
        } => {
            require_login(&state)?;
            let update = ProfileUpdate {
                first_name,
                last_name,
                phone_number: phone,
                date_of_birth,
                avatar,
            };
            state.auth.update_profile(&update).await?;
            println!("Profile updated");
        }
    }

    Ok(())
}

fn default_session_file() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/nyamix/session.json"))
}

fn require_login(state: &AppState) -> CliResult<()> {
    if state.session.is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn)
    }
}

async fn find_event(state: &AppState, id: u64) -> CliResult<Event> {
    state
        .events
        .find_event(id)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("Event {id} not found")))
}

fn print_event_line(event: &Event) {
    let price = catalog::price_label(&event.ticket_types).unwrap_or_else(|| "-".to_string());
    let category = event.category.as_ref().map(|c| c.name.as_str()).unwrap_or("-");
    println!(
        "{:>4}  {}  [{}]  {}  {}  {}",
        event.id,
        event.title,
        category,
        event.date,
        price,
        catalog::availability(&event.ticket_types).label()
    );
}

fn print_event_detail(state: &AppState, event: &Event) {
    println!("{}", event.title);
    println!("  When:  {}", event.date);
    println!("  Where: {}", event.location);
    if let Some(category) = &event.category {
        println!("  Category: {}", category.name);
    }
    if let Some(age) = &event.age_restriction {
        println!("  Age: {age}");
    }
    if let Some(phone) = &event.phone_number {
        println!("  Contact: {phone}");
    }
    println!(
        "  Image: {}",
        catalog::image_url(&state.config.image_base_url, &event.image)
    );
    println!();
    println!("{}", event.description);
    println!();
    println!("Tickets:");
    for t in &event.ticket_types {
        let left = if t.quantity_available == 0 {
            "sold out".to_string()
        } else {
            format!("{} left", t.quantity_available)
        };
        println!("  {:>4}  {:<20} K{}  ({left})", t.id, t.name, catalog::format_price(t.price));
    }
}

fn print_ticket(view: &TicketView) {
    let t = &view.ticket;
    println!(
        "{}  #{}  {}  {} x{}  K{}",
        t.id,
        t.ticket_number,
        t.event_title,
        t.ticket_type_name,
        t.quantity,
        t.total().normalize()
    );
    let line = match &view.display {
        TicketDisplay::Attended => "Attended".to_string(),
        TicketDisplay::Redeemable { secret_code } => format!("Redemption code: {secret_code}"),
        TicketDisplay::RetryPayment => {
            format!("{} - run `nyamix retry --ticket {}`", view.payment_label, t.id)
        }
        TicketDisplay::PaymentProcessing => "Payment processing".to_string(),
        TicketDisplay::Issued => view.payment_label.clone(),
    };
    println!("    {}  {}  {}", t.event_date, t.event_location, line);
}
