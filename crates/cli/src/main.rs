use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use relay::gateway::{
    ConversationRequest, ConversationResponse, Envelope, OptionalArgs, CONVERSATION_REQUEST,
    CONVERSATION_RESPONSE,
};
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Conversation relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the relay (WebSocket channel, health probe and /test-llm on one port).
    Serve {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Listen port (default: RELAY_PORT or EXPRESS_PORT, then config, then 5050)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat with a running relay over WebSocket (interactive).
    Chat {
        /// Relay WebSocket URL.
        #[arg(long, default_value = "ws://127.0.0.1:5050/")]
        url: String,

        /// Send a session-start (init) request before the first line.
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { url, init }) => {
            if let Err(e) = run_chat(&url, init).await {
                log::error!("chat failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = relay::config::load_config(config_path)?;
    log::debug!("config path: {}", path.display());
    config.server.port = port.unwrap_or_else(|| relay::config::resolve_port(&config));
    log::info!("starting relay on {}:{}", config.server.bind, config.server.port);
    relay::gateway::run_server(config).await
}

async fn run_chat(url: &str, init: bool) -> anyhow::Result<()> {
    use anyhow::Context;
    use std::io::{self, Write};

    let (mut ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .with_context(|| format!("connecting to {}", url))?;

    if init {
        let mut req = ConversationRequest::new("");
        req.optional_args = Some(OptionalArgs {
            kind: Some("init".to_string()),
            ..Default::default()
        });
        let resp = exchange(&mut ws, &req).await?;
        print_response(&resp);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        match exchange(&mut ws, &ConversationRequest::new(input)).await {
            Ok(resp) => print_response(&resp),
            Err(e) => eprintln!("chat error: {:#}", e),
        }
    }

    let _ = ws.close(None).await;
    Ok(())
}

/// Send one conversationRequest envelope and wait for the next conversationResponse.
async fn exchange<S>(ws: &mut S, req: &ConversationRequest) -> anyhow::Result<ConversationResponse>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let envelope = Envelope {
        category: Some("scene".to_string()),
        kind: Some("event".to_string()),
        name: CONVERSATION_REQUEST.to_string(),
        body: serde_json::to_value(req)?,
    };
    ws.send(Message::Text(envelope.to_json()?)).await?;

    while let Some(msg) = ws.next().await {
        let Message::Text(text) = msg? else { continue };
        let env = match relay::gateway::parse_envelope(text.as_bytes()) {
            Ok(env) => env,
            Err(e) => {
                log::debug!("skipping frame: {}", e);
                continue;
            }
        };
        if env.name != CONVERSATION_RESPONSE {
            continue;
        }
        return Ok(serde_json::from_value(env.body)?);
    }
    anyhow::bail!("connection closed before a response arrived")
}

fn print_response(resp: &ConversationResponse) {
    println!("< {}", resp.output.text.trim());
    for (key, content) in &resp.variables {
        println!("  [{}] {} {}", key, content.component, content.data);
    }
    if resp.fallback {
        println!("  (fallback)");
    }
}
