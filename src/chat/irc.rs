use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use futures::stream::SplitSink;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, Framed};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::IrcConfig;
use crate::dispatch::strip_address;
use crate::telemetry::{self};
use crate::telemetry::ops::chat::Phase as ChatPhase;

use super::{ChatHandler, Outbound};

const RECONNECT_DELAY: Duration = Duration::from_secs(30);
const MAX_LINE: usize = 8192;
// Room for "PRIVMSG <target> :" and the server-added prefix within 512 bytes.
const MAX_TEXT_BYTES: usize = 400;

/// One parsed protocol line. The trailing parameter, if any, is the last
/// element of `params`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);
        let prefix = if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = stripped.split_once(' ')?;
            rest = r;
            Some(p.to_string())
        } else {
            None
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((h, t)) => (h, Some(t)),
            None => (rest, None),
        };
        let mut words = head.split(' ').filter(|w| !w.is_empty());
        let command = words.next()?.to_ascii_uppercase();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(t) = trailing { params.push(t.to_string()); }
        Some(IrcMessage { prefix, command, params })
    }

    /// Nickname part of the prefix (`nick!user@host`).
    pub fn nick(&self) -> Option<&str> {
        self.prefix.as_deref().map(|p| p.split('!').next().unwrap_or(p))
    }

    fn param(&self, idx: usize) -> &str {
        self.params.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Split outbound text into protocol-safe lines: one per input line, empty
/// lines dropped, long lines cut on a char boundary.
pub fn split_message(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for line in text.split('\n') {
        let mut line = line.trim_end_matches('\r');
        while line.len() > MAX_TEXT_BYTES {
            let mut cut = MAX_TEXT_BYTES;
            while !line.is_char_boundary(cut) { cut -= 1; }
            out.push(line[..cut].to_string());
            line = &line[cut..];
        }
        if !line.trim().is_empty() { out.push(line.to_string()); }
    }
    out
}

struct WireLine {
    text: String,
    throttled: bool,
}

type LineSink = SplitSink<Framed<TcpStream, IrcCodec>, String>;

/// CRLF line framing. Inbound bytes are decoded lossily: servers relay
/// whatever encoding a user's client sends, and one bad byte must not end
/// the session. Lines longer than `MAX_LINE` are skipped.
#[derive(Debug, Default)]
pub struct IrcCodec {
    discarding: bool,
}

impl Decoder for IrcCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let Some(pos) = buf.iter().position(|b| *b == b'\n') else {
                if buf.len() > MAX_LINE {
                    buf.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };
            let raw = buf.split_to(pos + 1);
            if self.discarding || pos > MAX_LINE {
                self.discarding = false;
                continue;
            }
            let line = &raw[..pos];
            let line = line.strip_suffix(&b"\r"[..]).unwrap_or(line);
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        if let Some(line) = self.decode(buf)? { return Ok(Some(line)); }
        if buf.is_empty() || self.discarding {
            buf.clear();
            return Ok(None);
        }
        let rest = buf.split_to(buf.len());
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

impl Encoder<String> for IrcCodec {
    type Error = io::Error;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), io::Error> {
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}

/// Minimal IRC client: keeps one connection to one channel alive and
/// translates protocol traffic into [`ChatHandler`] callbacks.
pub struct IrcClient {
    cfg: IrcConfig,
    connected: Arc<AtomicBool>,
}

impl IrcClient {
    pub fn new(cfg: IrcConfig) -> Self {
        Self { cfg, connected: Arc::new(AtomicBool::new(false)) }
    }

    /// Shared flag that is true while the channel is joined.
    pub fn connected_flag(&self) -> Arc<AtomicBool> { self.connected.clone() }

    /// Connect, and reconnect after every loss, until `cancel` fires.
    pub async fn run(self, handler: Arc<dyn ChatHandler>, mut outbound: mpsc::Receiver<Outbound>, cancel: CancellationToken) {
        let log = telemetry::chat();
        loop {
            let span = log.span_kv(&ChatPhase::Session, [("server", self.cfg.server.clone()), ("channel", self.cfg.channel.clone())]);
            let result = self.session(handler.as_ref(), &mut outbound, &cancel).instrument(span).await;
            if cancel.is_cancelled() { break; }
            match result {
                Ok(()) => log.warn(format!("🔌 Lost connection to {}, reconnecting in {}s", self.cfg.server, RECONNECT_DELAY.as_secs())),
                Err(e) => log.error_kv(
                    &format!("🔌 Connection to {} failed ({e:#}), reconnecting in {}s", self.cfg.server, RECONNECT_DELAY.as_secs()),
                    [("server", self.cfg.server.clone()), ("error", format!("{e:#}"))],
                ),
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(RECONNECT_DELAY) => {}
            }
        }
    }

    async fn session(&self, handler: &dyn ChatHandler, outbound: &mut mpsc::Receiver<Outbound>, cancel: &CancellationToken) -> Result<()> {
        let log = telemetry::chat();
        let addr = format!("{}:{}", self.cfg.server, self.cfg.port);
        log.info_kv(&format!("📡 Connecting to {addr}"), [("server", addr.clone())]);
        let stream = TcpStream::connect(&addr).await.with_context(|| format!("connect {addr}"))?;
        let (sink, mut lines) = Framed::new(stream, IrcCodec::default()).split();

        let (wire_tx, wire_rx) = mpsc::unbounded_channel::<WireLine>();
        let writer = tokio::spawn(write_loop(sink, wire_rx, self.cfg.line_rate));
        let raw = |text: String| { let _ = wire_tx.send(WireLine { text, throttled: false }); };
        let say = |target: &str, text: &str| {
            for line in split_message(text) {
                let _ = wire_tx.send(WireLine { text: format!("PRIVMSG {target} :{line}"), throttled: true });
            }
        };

        let mut nick = self.cfg.nickname.clone();
        raw(format!("NICK {nick}"));
        raw(format!("USER {nick} 0 * :merge request monitor"));

        let mut joined = false;
        let result: Result<()> = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    raw("QUIT :shutting down".to_string());
                    break Ok(());
                }
                Some(out) = outbound.recv(), if joined => say(&out.target, &out.text),
                line = lines.next() => {
                    let line = match line {
                        None => break Ok(()),
                        Some(Err(e)) => break Err(e.into()),
                        Some(Ok(line)) => line,
                    };
                    let Some(msg) = IrcMessage::parse(&line) else { continue };
                    match msg.command.as_str() {
                        "PING" => raw(format!("PONG :{}", msg.param(0))),
                        "001" => {
                            log.info(format!("✅ Signed on as {nick}"));
                            raw(format!("JOIN {}", self.cfg.channel));
                        }
                        "433" => {
                            nick.push('_');
                            log.warn(format!("Nickname in use, trying {nick}"));
                            raw(format!("NICK {nick}"));
                        }
                        "JOIN" if msg.nick() == Some(nick.as_str()) && msg.param(0).eq_ignore_ascii_case(&self.cfg.channel) => {
                            log.info(format!("✅ Joined {}", self.cfg.channel));
                            joined = true;
                            self.connected.store(true, Ordering::SeqCst);
                            handler.on_connected().await;
                        }
                        "KICK" if msg.param(1) == nick && msg.param(0).eq_ignore_ascii_case(&self.cfg.channel) => {
                            log.warn(format!("Kicked from {}", self.cfg.channel));
                            break Ok(());
                        }
                        "ERROR" => break Err(anyhow::anyhow!("server error: {}", msg.param(0))),
                        "PRIVMSG" => {
                            let Some(user) = msg.nick() else { continue };
                            let target = msg.param(0);
                            let text = msg.param(1);
                            let (reply_to, command) = if target.eq_ignore_ascii_case(&nick) {
                                (user.to_string(), Some(text))
                            } else if target.eq_ignore_ascii_case(&self.cfg.channel) {
                                (self.cfg.channel.clone(), strip_address(&nick, text))
                            } else {
                                continue;
                            };
                            let Some(command) = command else { continue };
                            if let Some(reply) = handler.on_inbound_message(user, target, command).await {
                                say(&reply_to, &reply);
                            }
                        }
                        _ => {}
                    }
                }
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        if joined { handler.on_disconnected().await; }
        drop(wire_tx);
        // Let the writer flush QUIT (or whatever is queued) before the socket goes.
        let _ = tokio::time::timeout(Duration::from_secs(2), writer).await;
        if result.is_ok() && !cancel.is_cancelled() && !joined {
            bail!("connection closed before joining {}", self.cfg.channel);
        }
        result
    }
}

async fn write_loop(mut sink: LineSink, mut rx: mpsc::UnboundedReceiver<WireLine>, line_rate: Duration) -> Result<()> {
    let mut next_slot = Instant::now();
    while let Some(line) = rx.recv().await {
        if line.throttled {
            sleep_until(next_slot).await;
            next_slot = Instant::now() + line_rate;
        }
        sink.send(line.text).await?;
    }
    Ok(())
}
