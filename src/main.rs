use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use parley_gateway::voice::{SAMPLE_RATE, collect_stream, pcm_to_wav};
use parley_gateway::{
    CallRequest, Config, InboundMessage, Orchestrator, SpeechProvider, SpeechStream,
    TextToSpeech, WhatsAppChannel, build_response_provider,
};

/// Parley - Messaging conversation gateway for AI assistants
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/parley/config.toml)
    #[arg(short, long, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one form-encoded webhook payload through the conversation
    Handle {
        /// Raw payload, e.g. "From=whatsapp%3A%2B1555...&To=...&Body=hi"
        payload: String,
    },
    /// Chat from stdin, one message per line, as the configured user
    Chat,
    /// Send a message to the configured user
    Send {
        /// Message text
        text: String,
    },
    /// Synthesize speech to a file
    Say {
        /// Text to speak
        text: String,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
        /// Write a WAV file instead of raw PCM
        #[arg(long)]
        wav: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley_gateway=info",
        1 => "info,parley_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(
        chat = ?config.chat.provider,
        speech = ?config.speech.provider,
        "loaded configuration"
    );

    match cli.command {
        Command::Handle { payload } => cmd_handle(&config, &payload).await,
        Command::Chat => cmd_chat(&config).await,
        Command::Send { text } => cmd_send(&config, &text).await,
        Command::Say { text, out, wav } => cmd_say(&config, &text, &out, wav).await,
    }
}

/// Build an orchestrator with a call handler that only logs the request
///
/// Speech is left out; only `say` needs it and builds its own provider.
fn build_orchestrator(config: &Config) -> anyhow::Result<(Orchestrator, Arc<WhatsAppChannel>)> {
    let responder = build_response_provider(&config.chat)?;
    let channel = Arc::new(WhatsAppChannel::new(&config.channel)?);

    let mut orchestrator =
        Orchestrator::from_config(&config.conversation, Arc::from(responder), channel.clone())?;

    orchestrator.set_call_handler(|request: CallRequest| async move {
        tracing::info!(
            requester = %request.requester,
            context = %request.context,
            "call requested; no telephony backend attached"
        );
        Ok::<_, parley_gateway::Error>(())
    })?;

    Ok((orchestrator, channel))
}

async fn cmd_handle(config: &Config, payload: &str) -> anyhow::Result<()> {
    let Some(message) = WhatsAppChannel::parse_inbound(payload) else {
        anyhow::bail!("invalid webhook payload: From, To and Body are required");
    };

    let (mut orchestrator, _) = build_orchestrator(config)?;
    let outcome = orchestrator.handle_incoming(&message).await?;
    println!("{}", outcome.text());
    Ok(())
}

async fn cmd_chat(config: &Config) -> anyhow::Result<()> {
    let (mut orchestrator, channel) = build_orchestrator(config)?;
    let user = channel.recipient_address().to_string();
    if user.is_empty() {
        anyhow::bail!("USER_WHATSAPP_NUMBER is required for chat");
    }

    tracing::info!(user = %user, "chat session started; Ctrl-D to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let message = InboundMessage {
            sender: user.clone(),
            recipient: config.channel.sender_address.clone(),
            body: line,
        };
        let outcome = orchestrator.handle_incoming(&message).await?;
        println!("< {}", outcome.text());
    }

    Ok(())
}

async fn cmd_send(config: &Config, text: &str) -> anyhow::Result<()> {
    let channel = WhatsAppChannel::new(&config.channel)?;
    let receipt = channel.send_text(text).await?;
    println!("{}", receipt.id);
    Ok(())
}

async fn cmd_say(config: &Config, text: &str, out: &Path, wav: bool) -> anyhow::Result<()> {
    let tts = TextToSpeech::new(&config.speech)?;
    let stream = tts.synthesize_stream(text).await?;
    write_speech(stream, out, wav).await
}

/// Write synthesized audio to `out`
///
/// Raw PCM is written chunk by chunk; WAV needs the whole payload for its
/// header, so it is buffered first.
async fn write_speech(mut stream: SpeechStream, out: &Path, wav: bool) -> anyhow::Result<()> {
    let mut file = tokio::fs::File::create(out).await?;

    let written = if wav {
        let pcm = collect_stream(stream).await?;
        let audio = pcm_to_wav(&pcm, SAMPLE_RATE)?;
        file.write_all(&audio).await?;
        audio.len()
    } else {
        let mut written = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            tracing::debug!(bytes = chunk.len(), "audio chunk");
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        written
    };

    file.flush().await?;
    tracing::info!(path = %out.display(), bytes = written, "speech written");
    Ok(())
}
