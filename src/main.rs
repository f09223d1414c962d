// Line-driven transcription client
//
// Every line typed on stdin is treated as a recognition result and forwarded
// as a chunk over a reconnecting WebSocket channel. Commands:
//   /pause, /resume, /stop   drive the transcription session
//   ~some words              emit an interim (non-final) result
//   /error <kind>            emit an engine error, e.g. `/error network`

use anyhow::Result;
use clap::Parser;
use live_transcript::{
    ChannelHandlers, ChunkMessage, Config, ControlAction, ControlMessage, ManualProvider,
    ResilientChannel, SessionCallbacks, SessionState, TranscriptionSession, WebSocketConnector,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "live-transcript", about = "Stream transcript chunks over a resilient channel")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/live-transcript")]
    config: String,

    /// Override the channel URL
    #[arg(long)]
    url: Option<String>,

    /// Override the recognition language
    #[arg(long)]
    lang: Option<String>,
}

enum Notice {
    ChannelOpen,
    Chunk(live_transcript::TranscriptChunk),
    Ended,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(url) = args.url {
        cfg.channel.url = url;
    }
    if let Some(lang) = args.lang {
        cfg.transcription.lang = lang;
    }

    let session_id = format!("session-{}", uuid::Uuid::new_v4());
    info!("live-transcript v{}", env!("CARGO_PKG_VERSION"));
    info!("Session {} → {}", session_id, cfg.channel.url);

    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel();

    // Sends made before the channel opens are dropped, so the session state is
    // announced from the main loop on every (re)open instead
    let open_tx = notice_tx.clone();
    let handlers = ChannelHandlers::new()
        .on_open(move || {
            info!("Channel open");
            let _ = open_tx.send(Notice::ChannelOpen);
        })
        .on_message(|message| info!("Server: {:?}", message))
        .on_close(|event| warn!("Channel closed (code={}, clean={})", event.code, event.was_clean))
        .on_error(|e| warn!("Channel error: {:#}", e));

    let channel = ResilientChannel::connect_with(
        cfg.channel.url.clone(),
        handlers,
        Arc::new(WebSocketConnector::new()),
        cfg.channel.backoff(),
    );

    let end_tx = notice_tx.clone();
    let callbacks = SessionCallbacks::new(move |chunk| {
        let _ = notice_tx.send(Notice::Chunk(chunk));
    })
    .on_error(|e| error!("Transcription error: {}", e))
    .on_end(move || {
        let _ = end_tx.send(Notice::Ended);
    });

    let provider = ManualProvider::new();
    let session = TranscriptionSession::new(
        Arc::new(provider.clone()),
        cfg.transcription.clone(),
        callbacks,
    );

    session.start();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let line = match line? {
                    Some(line) => line,
                    None => {
                        info!("stdin closed");
                        stdin_open = false;
                        session.stop();
                        if session.state() != SessionState::Stopped {
                            break;
                        }
                        continue;
                    }
                };
                let line = line.trim();

                match line {
                    "" => {}
                    "/pause" | "/resume" => {
                        let before = session.state();
                        if line == "/pause" {
                            session.pause();
                        } else {
                            session.resume();
                        }
                        if let Some(notice) = ControlMessage::for_transition(before, session.state()) {
                            channel.send_json(&notice);
                        }
                    }
                    "/stop" => {
                        session.stop();
                        if session.state() != SessionState::Stopped {
                            break;
                        }
                    }
                    _ => {
                        if let Some(kind) = line.strip_prefix("/error ") {
                            provider.push_error(kind.trim(), "raised from stdin");
                        } else if let Some(text) = line.strip_prefix('~') {
                            provider.push_interim(text.trim());
                        } else {
                            provider.push_final(line);
                        }
                    }
                }
            }

            notice = notice_rx.recv() => match notice {
                Some(Notice::ChannelOpen) => {
                    if let Some(announcement) = ControlMessage::for_state(session.state()) {
                        channel.send_json(&announcement);
                    }
                }
                Some(Notice::Chunk(chunk)) => {
                    info!("[{} ms] {}{}", chunk.timestamp_ms, chunk.text, if chunk.is_final { "" } else { " …" });
                    channel.send_json(&ChunkMessage::new(session_id.clone(), sequence, &chunk));
                    sequence += 1;
                }
                Some(Notice::Ended) | None => {
                    channel.send_json(&ControlMessage::new(ControlAction::Stop));
                    break;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                session.stop();
                if session.state() != SessionState::Stopped {
                    break;
                }
            }
        }
    }

    let stats = session.stats();
    info!(
        "Session finished: {} chunks ({} final), {} engine(s), {} error(s)",
        stats.chunks_delivered, stats.final_chunks, stats.engines_created, stats.errors_reported
    );

    channel.shutdown().await;
    Ok(())
}
