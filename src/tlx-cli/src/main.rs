//! TLX CLI — log in, list and export ads/CRM data, check the plan, watch
//! the dashboard, and work the service-shop agenda from a terminal.

mod agenda;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tlx_client::export::{self, json_rows, Delimiter};
use tlx_client::table::{plan_usage_rows, text_table};
use tlx_client::{AdsApi, ApiClient, DashboardPoller, PollerSettings, ReminderPoller, Route, TokenStore, WorkshopApi};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "tlx-cli")]
#[command(about = "Command-line client for the TLX ads and service-shop APIs")]
#[command(version)]
struct Cli {
    /// Ads/CRM API base URL
    #[arg(long, env = "TLX_API_URL", default_value = "http://127.0.0.1:8000")]
    api_url: String,

    /// Service-shop API base URL, including the /api prefix
    #[arg(long, env = "TLX_WORKSHOP_URL", default_value = "http://127.0.0.1:8001/api")]
    workshop_url: String,

    /// Session profile; each profile keeps its own tokens
    #[arg(long, env = "TLX_PROFILE", default_value = "default")]
    profile: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "TLX_PASSWORD")]
        password: String,

        /// Tenant to log into (ads API only)
        #[arg(long)]
        tenant: Option<String>,

        /// Log into the service-shop API instead
        #[arg(long, default_value_t = false)]
        workshop: bool,
    },

    /// Forget the stored session
    Logout {
        #[arg(long, default_value_t = false)]
        workshop: bool,
    },

    /// Show the logged-in user
    Me {
        #[arg(long, default_value_t = false)]
        workshop: bool,
    },

    /// Ads
    Ads {
        #[command(subcommand)]
        command: AdsCommand,
    },

    /// Contacts
    Contacts {
        #[command(subcommand)]
        command: ExportCommand,
    },

    /// Delivery queue
    Deliveries {
        #[command(subcommand)]
        command: ExportCommand,
    },

    /// Current plan and usage
    Plan,

    /// Tracking dashboard
    Dashboard {
        #[command(subcommand)]
        command: DashboardCommand,
    },

    /// Show the view behind a dashboard path, e.g. `/contacts`
    View { path: String },

    /// Service-shop agenda
    Agenda {
        #[command(subcommand)]
        command: agenda::AgendaCommand,
    },

    /// Service-shop reminders
    Reminders {
        #[command(subcommand)]
        command: RemindersCommand,
    },
}

#[derive(Subcommand)]
enum AdsCommand {
    /// List ads
    List {
        /// draft, scheduled or sent
        #[arg(long)]
        status: Option<String>,

        /// Search title and body
        #[arg(short, long)]
        q: Option<String>,

        /// Print CSV instead of a table
        #[arg(long, default_value_t = false)]
        csv: bool,

        #[arg(long, default_value = ",")]
        delimiter: Delimiter,
    },
}

#[derive(Subcommand)]
enum ExportCommand {
    /// Export every row as CSV
    Export {
        /// Search text (contacts) or status (deliveries)
        #[arg(long)]
        filter: Option<String>,

        #[arg(long, default_value = ",")]
        delimiter: Delimiter,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum RemindersCommand {
    /// Poll for upcoming appointments and print each one once
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Reminder window in minutes
        #[arg(long, default_value_t = 15)]
        within: u32,

        /// Mark announced appointments as reminded on the server
        #[arg(long, default_value_t = false)]
        mark: bool,
    },
}

#[derive(Subcommand)]
enum DashboardCommand {
    /// Print the click and conversion counters whenever they change
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}

struct Apis {
    ads: AdsApi,
    workshop: WorkshopApi,
}

impl Apis {
    fn new(cli: &Cli) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(cli.timeout.max(1));
        let ads = ApiClient::new(&cli.api_url, TokenStore::for_profile(&cli.profile), timeout)?;
        let workshop = ApiClient::new(
            &cli.workshop_url,
            TokenStore::for_profile(&format!("{}-workshop", cli.profile)),
            timeout,
        )?;
        Ok(Self {
            ads: AdsApi::new(ads),
            workshop: WorkshopApi::new(workshop),
        })
    }

    fn tokens(&self, workshop: bool) -> &TokenStore {
        if workshop {
            self.workshop.client().tokens()
        } else {
            self.ads.client().tokens()
        }
    }
}

fn write_output(text: &str, output: Option<&PathBuf>) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

/// `(header, field)` pairs for the list views.
const AD_VIEW: &[(&str, &str)] = &[
    ("ID", "id"),
    ("STATUS", "status"),
    ("CHANNEL", "channel"),
    ("SCHEDULED", "scheduled_at"),
    ("TITLE", "title"),
];
const TEMPLATE_VIEW: &[(&str, &str)] = &[("ID", "id"), ("NAME", "name"), ("UPDATED", "updated_at"), ("BODY", "body")];
const SEGMENT_VIEW: &[(&str, &str)] = &[("ID", "id"), ("NAME", "name"), ("CREATED", "created_at")];
const CAMPAIGN_VIEW: &[(&str, &str)] = &[
    ("ID", "id"),
    ("STATUS", "status"),
    ("START", "start_at"),
    ("END", "end_at"),
    ("NAME", "name"),
];
const CONTACT_VIEW: &[(&str, &str)] = &[("ID", "id"), ("NAME", "name"), ("EMAIL", "email"), ("PHONE", "phone")];
const DELIVERY_VIEW: &[(&str, &str)] = &[
    ("ID", "id"),
    ("STATUS", "status"),
    ("CHANNEL", "channel"),
    ("ATTEMPTS", "attempts"),
    ("TO", "to_addr"),
];

fn print_table(items: &[Value], columns: &[(&str, &str)], noun: &str) {
    let headers: Vec<&str> = columns.iter().map(|(h, _)| *h).collect();
    let fields: Vec<&str> = columns.iter().map(|(_, f)| *f).collect();
    print!("{}", text_table(&headers, &json_rows(items, &fields)));
    println!("{} {noun}(s)", items.len());
}

fn print_plan(plan: &Value) {
    let field = |key: &str| export::cell(plan.get(key));
    println!("Plan: {} ({})", field("plan"), field("status"));
    print!("{}", text_table(&["RESOURCE", "USED", "LIMIT"], &plan_usage_rows(plan)));
}

fn print_dashboard(summary: &Value) {
    let rows = vec![json_rows(
        std::slice::from_ref(summary),
        &["clicks", "conversions", "impressions_proxy", "ctr_proxy", "ts"],
    )
    .concat()];
    print!("{}", text_table(&["CLICKS", "CONVERSIONS", "IMPRESSIONS", "CTR", "AT"], &rows));
}

fn as_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

async fn view(apis: &Apis, path: &str) -> anyhow::Result<()> {
    let route = Route::from_path(path);
    match route {
        Route::Dashboard => print_dashboard(&apis.ads.dashboard().await?),
        Route::Ads => print_table(&apis.ads.ads(None, None).await?, AD_VIEW, "ad"),
        Route::Templates => print_table(&as_items(apis.ads.list("/templates").await?), TEMPLATE_VIEW, "template"),
        Route::Segments => print_table(&as_items(apis.ads.list("/segments").await?), SEGMENT_VIEW, "segment"),
        Route::Campaigns => print_table(&as_items(apis.ads.list("/campaigns").await?), CAMPAIGN_VIEW, "campaign"),
        Route::Contacts => print_table(&apis.ads.contacts(None).await?, CONTACT_VIEW, "contact"),
        Route::Deliveries => print_table(&apis.ads.deliveries(None).await?, DELIVERY_VIEW, "delivery"),
        Route::Plans => print_plan(&apis.ads.plan().await?),
        Route::Agenda => return agenda::print_week(&apis.workshop, None).await,
        Route::Login => bail!("use `tlx-cli login` to start a session"),
        Route::NotFound => bail!("no view at {path}"),
    }
    Ok(())
}

fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });
    shutdown_rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let apis = Apis::new(&cli)?;

    match cli.command {
        Commands::Login {
            email,
            password,
            tenant,
            workshop,
        } => {
            if workshop {
                let session = apis.workshop.login(&email, &password).await?;
                println!("Logged in as {} ({})", session.user.email, session.user.role);
            } else {
                let session = apis.ads.login(&email, &password, tenant.as_deref()).await?;
                match (session.tenant_id, session.role) {
                    (Some(tenant_id), Some(role)) => println!("Logged in to tenant {tenant_id} as {role}"),
                    _ => println!("Logged in (no tenant selected)"),
                }
            }
            println!("Session saved to {}", apis.tokens(workshop).path().display());
        }
        Commands::Logout { workshop } => {
            apis.tokens(workshop).clear()?;
            println!("Logged out");
        }
        Commands::Me { workshop } => {
            if workshop {
                let me = apis.workshop.me().await?;
                println!("#{} {} ({})", me.id, me.email, me.role);
            } else {
                let me = apis.ads.me().await?;
                let tenant = me.tenant_id.map_or_else(|| "-".to_string(), |t| t.to_string());
                let role = me.role.unwrap_or_else(|| "-".to_string());
                println!("#{} {}  tenant={tenant} role={role}", me.id, me.email);
            }
        }
        Commands::Ads {
            command:
                AdsCommand::List {
                    status,
                    q,
                    csv,
                    delimiter,
                },
        } => {
            let ads = apis.ads.ads(status.as_deref(), q.as_deref()).await?;
            if csv {
                let rows = json_rows(&ads, export::AD_COLUMNS);
                print!("{}", export::to_csv(export::AD_COLUMNS, &rows, delimiter));
            } else {
                print_table(&ads, AD_VIEW, "ad");
            }
        }
        Commands::Contacts {
            command: ExportCommand::Export {
                filter,
                delimiter,
                output,
            },
        } => {
            let contacts = apis.ads.contacts(filter.as_deref()).await?;
            let rows = json_rows(&contacts, export::CONTACT_COLUMNS);
            write_output(&export::to_csv(export::CONTACT_COLUMNS, &rows, delimiter), output.as_ref())?;
        }
        Commands::Deliveries {
            command: ExportCommand::Export {
                filter,
                delimiter,
                output,
            },
        } => {
            let deliveries = apis.ads.deliveries(filter.as_deref()).await?;
            let rows = json_rows(&deliveries, export::DELIVERY_COLUMNS);
            write_output(&export::to_csv(export::DELIVERY_COLUMNS, &rows, delimiter), output.as_ref())?;
        }
        Commands::Plan => print_plan(&apis.ads.plan().await?),
        Commands::Dashboard {
            command: DashboardCommand::Watch { interval },
        } => {
            DashboardPoller::new(Duration::from_secs(interval.max(1)))
                .run(&apis.ads, shutdown_on_ctrl_c(), print_dashboard)
                .await?;
        }
        Commands::View { path } => view(&apis, &path).await?,
        Commands::Agenda { command } => agenda::run(&apis.workshop, command).await?,
        Commands::Reminders {
            command: RemindersCommand::Watch { interval, within, mark },
        } => {
            let poller = ReminderPoller::new(PollerSettings {
                interval: Duration::from_secs(interval.max(1)),
                within_minutes: within,
                mark_reminded: mark,
            });
            poller
                .run(&apis.workshop, shutdown_on_ctrl_c(), |appt| {
                    println!(
                        "[reminder] #{} {} at {} ({} min, customer {})",
                        appt.id, appt.title, appt.scheduled_at, appt.duration_minutes, appt.customer_id
                    );
                })
                .await?;
        }
    }

    Ok(())
}
