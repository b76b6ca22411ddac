use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use wirechat::prelude::*;

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "chat-cli", version, about = "Terminal chat client")]
struct Cli {
    /// Host the client pretends to be served from.
    #[arg(long, env = "WIRECHAT_PAGE_HOST", default_value = "localhost")]
    page_host: String,

    /// Treat the page as served over HTTPS (dials `wss://` for remote hosts).
    #[arg(long)]
    https: bool,

    /// Port dialed when the page host is local.
    #[arg(long, env = "WIRECHAT_LOCAL_PORT", default_value_t = 9667)]
    local_port: u16,

    /// Host dialed when the page host is not local.
    #[arg(long, env = "WIRECHAT_REMOTE_HOST", default_value = "localhost")]
    remote_host: String,

    /// Protocol schema file (defaults to the built-in schema).
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,

    /// Do not deliver chat over HTTP while disconnected.
    #[arg(long)]
    no_fallback: bool,

    /// Your user id.
    #[arg(long, env = "WIRECHAT_USER", default_value = "guest")]
    user: String,

    /// Your display name.
    #[arg(long, default_value = "Guest")]
    nickname: String,

    /// Group to chat in.
    #[arg(long, default_value = "lobby")]
    group: String,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Input {
    Say(String),
    Join(String),
    Leave,
    Image(PathBuf),
    Recall(String),
    Status,
    Close,
    Connect,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Say(line.to_string());
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match (name, arg) {
        ("join", group) if !group.is_empty() => Input::Join(group.to_string()),
        ("leave", _) => Input::Leave,
        ("image", path) if !path.is_empty() => Input::Image(PathBuf::from(path)),
        ("recall", id) if !id.is_empty() => Input::Recall(id.to_string()),
        ("status", _) => Input::Status,
        ("close", _) => Input::Close,
        ("connect", _) => Input::Connect,
        ("quit", _) => Input::Quit,
        _ => Input::Unknown(line.to_string()),
    }
}

fn join(group: &str) -> LogicalMessage {
    LogicalMessage::new(MessageKind::JoinGroup, "").in_group(group)
}

fn leave(group: &str) -> LogicalMessage {
    LogicalMessage::new(MessageKind::LeaveGroup, "").in_group(group)
}

/// What to send in response to a connection event.
///
/// Group membership lives on the server connection, so every open (the first
/// one and each reconnect) joins the current group again.
fn reply_to(event: &ClientEvent, group: &str) -> Option<LogicalMessage> {
    match event {
        ClientEvent::Connected => Some(join(group)),
        _ => None,
    }
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Connected => println!("* connected"),
        ClientEvent::Closed(close) => println!("* disconnected: {close}"),
        ClientEvent::DeliveryFailed { message, error } => {
            println!("* not delivered: {:?} ({error})", message.content);
        }
        ClientEvent::Message(message) => {
            let who = message
                .sender_nickname
                .as_deref()
                .or(message.sender_id.as_deref())
                .unwrap_or("?");
            match message.kind {
                MessageKind::Image => {
                    let len = message.attachment().map_or(0, |a| a.bytes.len());
                    println!("[{who}] <image, {len} bytes>");
                }
                MessageKind::Text | MessageKind::Voice => println!("[{who}] {}", message.content),
                kind => println!("({kind}) {}", message.content),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let scheme = if cli.https {
        PageScheme::Https
    } else {
        PageScheme::Http
    };
    let schema = cli.schema.map_or(SchemaSource::Embedded, SchemaSource::File);

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let client = WirechatClient::builder()
        .page(PageLocation::new(scheme, cli.page_host))
        .local_port(cli.local_port)
        .remote_host(&cli.remote_host)
        .schema(schema)
        .http_fallback(!cli.no_fallback)
        .start(events_tx)
        .await?;
    tracing::info!(binary = client.binary_enabled(), "client started");

    eprintln!(
        "type to chat in {}; /join /leave /image /recall /status /close /connect /quit",
        cli.group
    );
    let mut group = cli.group;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                print_event(&event);
                if let Some(reply) = reply_to(&event, &group) {
                    client.send(reply);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_line(&line) {
                    Input::Say(text) => client.send(
                        LogicalMessage::text(text)
                            .from_sender(&cli.user, &cli.nickname)
                            .in_group(&group)
                            .mine(true),
                    ),
                    Input::Join(next) => {
                        client.send(leave(&group));
                        group = next;
                        client.send(join(&group));
                    }
                    Input::Leave => client.send(leave(&group)),
                    Input::Image(path) => match tokio::fs::read(&path).await {
                        Ok(bytes) => client.send(
                            LogicalMessage::image(bytes)
                                .from_sender(&cli.user, &cli.nickname)
                                .in_group(&group),
                        ),
                        Err(e) => eprintln!("cannot read {}: {e}", path.display()),
                    },
                    Input::Recall(id) => client.send(
                        LogicalMessage::recall(&group, id).from_sender(&cli.user, &cli.nickname),
                    ),
                    Input::Status => println!("{:?}", client.status().await?),
                    Input::Close => client.close().await?,
                    Input::Connect => {
                        client.resume_reconnect()?;
                        client.connect()?;
                    }
                    Input::Quit => break,
                    Input::Empty => {}
                    Input::Unknown(line) => eprintln!("unknown command: {line}"),
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_plain_text_is_chat() {
        assert_eq!(parse_line("  hello there "), Input::Say("hello there".into()));
    }

    #[test]
    fn test_parse_line_commands() {
        assert_eq!(parse_line("/join rust"), Input::Join("rust".into()));
        assert_eq!(parse_line("/image cat.jpg"), Input::Image("cat.jpg".into()));
        assert_eq!(parse_line("/recall 1700000000000"), Input::Recall("1700000000000".into()));
        assert_eq!(parse_line("/quit"), Input::Quit);
        assert_eq!(parse_line(""), Input::Empty);
    }

    #[test]
    fn test_parse_line_missing_argument_is_unknown() {
        assert_eq!(parse_line("/join"), Input::Unknown("/join".into()));
        assert_eq!(parse_line("/dance"), Input::Unknown("/dance".into()));
    }

    #[test]
    fn test_connected_joins_current_group() {
        let reply = reply_to(&ClientEvent::Connected, "rust").expect("should join on connect");
        assert_eq!(reply.kind, MessageKind::JoinGroup);
        assert_eq!(reply.group_id.as_deref(), Some("rust"));
    }

    #[test]
    fn test_other_events_send_nothing() {
        let closed = ClientEvent::Closed(CloseFrame::normal("bye"));
        assert!(reply_to(&closed, "rust").is_none());
        let message = ClientEvent::Message(LogicalMessage::text("hi"));
        assert!(reply_to(&message, "rust").is_none());
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["chat-cli"]).expect("defaults should parse");
        assert_eq!(cli.local_port, 9667);
        assert_eq!(cli.group, "lobby");
        assert!(!cli.https);
    }

    #[test]
    fn test_cli_remote_page() {
        let cli = Cli::try_parse_from([
            "chat-cli",
            "--page-host",
            "chat.example.com",
            "--https",
            "--remote-host",
            "ws.example.com",
        ])
        .expect("remote args should parse");
        assert_eq!(cli.page_host, "chat.example.com");
        assert!(cli.https);
    }
}
