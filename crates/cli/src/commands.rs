//! CLI commands

use anyhow::{Result, bail};
use chrono::NaiveDate;
use clap::Subcommand;
use hotelier_core::HotelierConfig;
use hotelier_http::HotelClient;
use hotelier_http::types::{LoginCredentials, RegisterCredentials, RoomCreate, RoomType};
use hotelier_session::BackOffice;
use serde::Serialize;
use tracing::info;

use crate::shell;

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and persist the session
    Login {
        /// Account e-mail
        #[arg(long, env = "HOTELIER_EMAIL")]
        email: String,

        #[arg(long, env = "HOTELIER_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and log in with it
    Register {
        #[arg(long)]
        email: String,

        #[arg(long, env = "HOTELIER_PASSWORD", hide_env_values = true)]
        password: String,

        /// Request administrator rights
        #[arg(long)]
        superuser: bool,
    },

    /// End the session and forget the persisted token
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Room operations
    Rooms {
        #[command(subcommand)]
        command: RoomCommands,
    },

    /// Guest operations
    Guests {
        #[command(subcommand)]
        command: GuestCommands,
    },

    /// Booking operations
    Bookings {
        #[command(subcommand)]
        command: BookingCommands,
    },

    /// Tariff lookups
    Tariffs {
        #[command(subcommand)]
        command: TariffCommands,
    },

    /// Financial transactions
    Financial {
        #[command(subcommand)]
        command: FinancialCommands,
    },

    /// Show headline numbers
    Dashboard,

    /// Interactive session with idle timeout
    Shell,

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
pub enum RoomCommands {
    List,
    Show {
        id: i64,
    },
    Create {
        number: String,

        /// GUEST_HOUSE or FRAME
        #[arg(long = "type")]
        room_type: RoomType,

        #[arg(long, default_value = "1")]
        floor: i32,

        #[arg(long, default_value = "2")]
        capacity: i32,

        #[arg(long)]
        price: f64,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        amenities: Option<String>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum GuestCommands {
    List,
    Show { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum BookingCommands {
    List,
    Show { id: i64 },
    /// Mark the guest as arrived
    CheckIn { id: i64 },
    Delete { id: i64 },
}

#[derive(Subcommand)]
pub enum TariffCommands {
    List {
        /// GUEST_HOUSE or FRAME
        #[arg(long = "type")]
        room_type: Option<RoomType>,
    },
    /// Tariff in effect for a room type
    Current {
        room_type: RoomType,

        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
pub enum FinancialCommands {
    List,
    Show { id: i64 },
}

impl Commands {
    /// Whether the command runs until the user leaves
    pub const fn is_interactive(&self) -> bool {
        matches!(self, Self::Shell)
    }

    pub async fn execute(self, office: &BackOffice, config: &HotelierConfig) -> Result<()> {
        let session = office.session();
        match self {
            Self::Login { email, password } => {
                let user = session
                    .login(&LoginCredentials {
                        username: email,
                        password,
                    })
                    .await?;
                info!(user = %user.email, "login complete");
                print_json(&user)
            }
            Self::Register {
                email,
                password,
                superuser,
            } => {
                let user = session
                    .register(&RegisterCredentials {
                        email,
                        password,
                        is_superuser: superuser.then_some(true),
                    })
                    .await?;
                print_json(&user)
            }
            Self::Logout => {
                session.logout();
                println!("Logged out");
                Ok(())
            }
            Self::Config => print_json(config),
            Self::Shell => {
                require_session(office).await?;
                shell::run(office).await
            }
            Self::Whoami => {
                require_session(office).await?;
                print_json(&session.state().current_user)
            }
            Self::Rooms { command } => {
                require_session(office).await?;
                command.execute(office.api()).await
            }
            Self::Guests { command } => {
                require_session(office).await?;
                command.execute(office.api()).await
            }
            Self::Bookings { command } => {
                require_session(office).await?;
                command.execute(office.api()).await
            }
            Self::Tariffs { command } => {
                require_session(office).await?;
                command.execute(office.api()).await
            }
            Self::Financial { command } => {
                require_session(office).await?;
                command.execute(office.api()).await
            }
            Self::Dashboard => {
                require_session(office).await?;
                print_json(&office.api().dashboard_stats().await?)
            }
        }
    }
}

impl RoomCommands {
    pub async fn execute(self, api: &HotelClient) -> Result<()> {
        match self {
            Self::List => print_json(&api.list_rooms().await?),
            Self::Show { id } => print_json(&api.get_room(id).await?),
            Self::Create {
                number,
                room_type,
                floor,
                capacity,
                price,
                description,
                amenities,
            } => {
                let room = RoomCreate {
                    number,
                    room_type,
                    floor,
                    capacity,
                    price_per_night: price,
                    description,
                    amenities,
                };
                let created = api.create_room(&room).await?;
                info!(id = created.id, number = %created.number, "room created");
                print_json(&created)
            }
            Self::Delete { id } => print_json(&api.delete_room(id).await?),
        }
    }
}

impl GuestCommands {
    pub async fn execute(self, api: &HotelClient) -> Result<()> {
        match self {
            Self::List => print_json(&api.list_guests().await?),
            Self::Show { id } => print_json(&api.get_guest(id).await?),
            Self::Delete { id } => print_json(&api.delete_guest(id).await?),
        }
    }
}

impl BookingCommands {
    pub async fn execute(self, api: &HotelClient) -> Result<()> {
        match self {
            Self::List => print_json(&api.list_bookings().await?),
            Self::Show { id } => print_json(&api.get_booking(id).await?),
            Self::CheckIn { id } => print_json(&api.check_in(id).await?),
            Self::Delete { id } => print_json(&api.delete_booking(id).await?),
        }
    }
}

impl TariffCommands {
    pub async fn execute(self, api: &HotelClient) -> Result<()> {
        match self {
            Self::List { room_type } => print_json(&api.list_tariffs(room_type).await?),
            Self::Current { room_type, date } => {
                print_json(&api.current_tariff(room_type, date).await?)
            }
        }
    }
}

impl FinancialCommands {
    pub async fn execute(self, api: &HotelClient) -> Result<()> {
        match self {
            Self::List => print_json(&api.list_transactions().await?),
            Self::Show { id } => print_json(&api.get_transaction(id).await?),
        }
    }
}

/// Restore the persisted session or ask the user to log in
pub async fn require_session(office: &BackOffice) -> Result<()> {
    if office.session().initialize().await {
        Ok(())
    } else {
        bail!("not logged in; run `hotelier login` first")
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
