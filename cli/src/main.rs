//! Commons API and live-connection CLI.
//!
//! REST subcommands drive the backend directly through the typed client;
//! `watch` opens a full community session and streams live updates into a
//! local mirror until interrupted.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::config::ClientConfig;
use client::drafts::DraftStore;
use client::net::api::{ApiClient, ApiError, InviteDraft, PostDraft};
use client::session::CommunitySession;
use client::state::members::Role;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("api request failed: {0}")]
    Api(#[from] ApiError),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown role `{0}` (expected admin, moderator, or member)")]
    UnknownRole(String),
    #[error("health check failed: HTTP {0}")]
    HealthCheck(u16),
    #[error("opening community failed: {0}")]
    Open(ApiError),
}

#[derive(Parser, Debug)]
#[command(name = "commons-cli", about = "Commons API and live-connection CLI")]
struct Cli {
    #[arg(long, env = "COMMONS_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "COMMONS_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "COMMONS_USER_ID", default_value_t = 0)]
    user_id: u64,

    #[arg(long, env = "COMMONS_USERNAME", default_value = "anonymous")]
    username: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Api(ApiCommand),
    Connect(ConnectCommand),
    Watch(WatchArgs),
}

#[derive(Args, Debug)]
struct ApiCommand {
    #[command(subcommand)]
    command: ApiSubcommand,
}

#[derive(Subcommand, Debug)]
enum ApiSubcommand {
    Community(CommunityCommand),
    Member(MemberCommand),
    Post(PostCommand),
    Event(EventCommand),
}

#[derive(Args, Debug)]
struct CommunityCommand {
    #[command(subcommand)]
    command: CommunitySubcommand,
}

#[derive(Subcommand, Debug)]
enum CommunitySubcommand {
    Read {
        slug: String,
    },
    Join {
        slug: String,
    },
    Leave {
        slug: String,
    },
    Settings {
        slug: String,
        #[arg(long)]
        data: String,
    },
    Invite {
        slug: String,
        #[arg(long, required = true, num_args = 1..)]
        recipient: Vec<String>,
        #[arg(long, default_value = "")]
        message: String,
    },
}

#[derive(Args, Debug)]
struct MemberCommand {
    #[command(subcommand)]
    command: MemberSubcommand,
}

#[derive(Subcommand, Debug)]
enum MemberSubcommand {
    List {
        slug: String,
    },
    Add {
        slug: String,
        #[arg(long)]
        username: String,
    },
    Role {
        slug: String,
        member_id: u64,
        #[arg(long)]
        role: String,
    },
    Remove {
        slug: String,
        member_id: u64,
    },
}

#[derive(Args, Debug)]
struct PostCommand {
    #[command(subcommand)]
    command: PostSubcommand,
}

#[derive(Subcommand, Debug)]
enum PostSubcommand {
    List {
        slug: String,
    },
    Create {
        slug: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        content: String,
    },
    Rate {
        slug: String,
        post_id: u64,
        #[arg(long)]
        rating: u8,
    },
}

#[derive(Args, Debug)]
struct EventCommand {
    #[command(subcommand)]
    command: EventSubcommand,
}

#[derive(Subcommand, Debug)]
enum EventSubcommand {
    List { slug: String },
    Join { slug: String, event_id: u64 },
    Leave { slug: String, event_id: u64 },
}

#[derive(Args, Debug)]
struct ConnectCommand {
    #[command(subcommand)]
    command: ConnectSubcommand,
}

#[derive(Subcommand, Debug)]
enum ConnectSubcommand {
    Request { member_id: u64 },
    Cancel { request_id: String },
}

#[derive(Args, Debug)]
struct WatchArgs {
    slug: String,

    #[arg(long, help = "Stop after this many seconds instead of ctrl-c")]
    seconds: Option<u64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig {
        base_url: cli.base_url,
        token: cli.token,
        user_id: cli.user_id,
        username: cli.username,
    };

    match cli.command {
        Command::Ping => run_ping(&config).await,
        Command::Api(api) => run_api(&config, api).await,
        Command::Connect(connect) => run_connect(&config, connect).await,
        Command::Watch(args) => run_watch(config, args).await,
    }
}

async fn run_ping(config: &ClientConfig) -> Result<(), CliError> {
    let url = format!("{}/healthz", config.base_url.trim_end_matches('/'));
    let response = reqwest::Client::new().get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::HealthCheck(status.as_u16()));
    }
    println!("ok");
    Ok(())
}

async fn run_api(config: &ClientConfig, api: ApiCommand) -> Result<(), CliError> {
    let client = ApiClient::new(config);
    match api.command {
        ApiSubcommand::Community(command) => run_api_community(&client, command).await,
        ApiSubcommand::Member(command) => run_api_member(&client, command).await,
        ApiSubcommand::Post(command) => run_api_post(&client, command).await,
        ApiSubcommand::Event(command) => run_api_event(&client, command).await,
    }
}

async fn run_api_community(client: &ApiClient, command: CommunityCommand) -> Result<(), CliError> {
    match command.command {
        CommunitySubcommand::Read { slug } => {
            let community = client.fetch_community(&slug).await?;
            print_json(&serde_json::to_value(&community)?)
        }
        CommunitySubcommand::Join { slug } => {
            let member = client.join_community(&slug).await?;
            print_json(&serde_json::to_value(&member)?)
        }
        CommunitySubcommand::Leave { slug } => {
            client.leave_community(&slug).await?;
            println!("left {slug}");
            Ok(())
        }
        CommunitySubcommand::Settings { slug, data } => {
            let patch = serde_json::from_str::<Value>(&data)?;
            let confirmed = client.update_settings(&slug, &patch).await?;
            print_json(&confirmed)
        }
        CommunitySubcommand::Invite {
            slug,
            recipient,
            message,
        } => {
            let invite = InviteDraft {
                recipients: recipient,
                message,
                template: None,
                role: None,
            };
            let sent = client.send_invites(&slug, &invite).await?;
            println!("sent {sent} invites");
            Ok(())
        }
    }
}

async fn run_api_member(client: &ApiClient, command: MemberCommand) -> Result<(), CliError> {
    match command.command {
        MemberSubcommand::List { slug } => {
            let members = client.fetch_members(&slug).await?;
            print_json(&serde_json::to_value(&members)?)
        }
        MemberSubcommand::Add { slug, username } => {
            let member = client.add_member(&slug, &username).await?;
            print_json(&serde_json::to_value(&member)?)
        }
        MemberSubcommand::Role {
            slug,
            member_id,
            role,
        } => {
            client
                .update_member_role(&slug, member_id, parse_role(&role)?)
                .await?;
            println!("member {member_id} is now {role}");
            Ok(())
        }
        MemberSubcommand::Remove { slug, member_id } => {
            client.remove_member(&slug, member_id).await?;
            println!("removed member {member_id}");
            Ok(())
        }
    }
}

async fn run_api_post(client: &ApiClient, command: PostCommand) -> Result<(), CliError> {
    match command.command {
        PostSubcommand::List { slug } => {
            let posts = client.fetch_posts(&slug).await?;
            print_json(&serde_json::to_value(&posts)?)
        }
        PostSubcommand::Create {
            slug,
            title,
            content,
        } => {
            let draft = PostDraft {
                title,
                content,
                media: Vec::new(),
            };
            let post = client.create_post(&slug, &draft).await?;
            print_json(&serde_json::to_value(&post)?)
        }
        PostSubcommand::Rate {
            slug,
            post_id,
            rating,
        } => {
            let outcome = client.rate_post(&slug, post_id, rating).await?;
            print_json(&serde_json::json!({
                "rating": outcome.rating,
                "total_ratings": outcome.total_ratings,
            }))
        }
    }
}

async fn run_api_event(client: &ApiClient, command: EventCommand) -> Result<(), CliError> {
    match command.command {
        EventSubcommand::List { slug } => {
            let events = client.fetch_events(&slug).await?;
            print_json(&serde_json::to_value(&events)?)
        }
        EventSubcommand::Join { slug, event_id } => {
            let participants = client.join_event(&slug, event_id).await?;
            println!("event {event_id} now has {participants} participants");
            Ok(())
        }
        EventSubcommand::Leave { slug, event_id } => {
            let participants = client.leave_event(&slug, event_id).await?;
            println!("event {event_id} now has {participants} participants");
            Ok(())
        }
    }
}

async fn run_connect(config: &ClientConfig, connect: ConnectCommand) -> Result<(), CliError> {
    let client = ApiClient::new(config);
    match connect.command {
        ConnectSubcommand::Request { member_id } => {
            let request_id = client.create_connection_request(member_id).await?;
            println!("{request_id}");
            Ok(())
        }
        ConnectSubcommand::Cancel { request_id } => {
            client.cancel_connection_request(&request_id).await?;
            println!("cancelled {request_id}");
            Ok(())
        }
    }
}

async fn run_watch(config: ClientConfig, args: WatchArgs) -> Result<(), CliError> {
    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let mut session = CommunitySession::new(config, DraftStore::in_memory());
            session.open(&args.slug).await.map_err(CliError::Open)?;
            eprintln!("watching {}; ctrl-c to stop", args.slug);

            match args.seconds {
                Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
                None => {
                    if tokio::signal::ctrl_c().await.is_err() {
                        tracing::warn!("ctrl-c handler unavailable; stopping");
                    }
                }
            }

            let snapshot = session.view().clone();
            session.close().await;

            print_json(&serde_json::json!({
                "slug": snapshot.slug,
                "connected": snapshot.link.is_connected(),
                "members": snapshot.members.len(),
                "posts": snapshot.posts.len(),
                "events": snapshot.events.len(),
                "member_count": snapshot.community.member_count,
                "online_count": snapshot.community.online_count,
            }))
        })
        .await
}

fn parse_role(raw: &str) -> Result<Role, CliError> {
    match raw {
        "admin" => Ok(Role::Admin),
        "moderator" => Ok(Role::Moderator),
        "member" => Ok(Role::Member),
        other => Err(CliError::UnknownRole(other.to_owned())),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
