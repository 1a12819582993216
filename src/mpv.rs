//! mpv-backed player widget.
//!
//! Each widget instance is one mpv process driven over its JSON IPC socket.
//! A background task owns the socket: it forwards queued commands, caches
//! the last reported position/duration, and translates mpv events into
//! [`WidgetEvent`]s for the adapter. The process is killed (and the socket
//! file removed) on destroy; a second destroy is a no-op.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{Error, Result};
use crate::player::{PlayState, PlayerWidget, WidgetEvent, WidgetHost, WidgetSettings};

static WIDGET_SEQ: AtomicU64 = AtomicU64::new(0);

/// Confirms that an mpv binary is runnable. The adapter awaits this exactly
/// once; afterwards every widget construction proceeds synchronously.
pub async fn probe() -> std::result::Result<(), String> {
    let output = Command::new("mpv")
        .arg("--version")
        .output()
        .await
        .map_err(|e| format!("mpv not found: {}", e))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(format!("mpv --version exited with {}", output.status))
    }
}

pub struct MpvHost;

impl WidgetHost for MpvHost {
    fn construct(
        &self,
        video_id: &str,
        settings: WidgetSettings,
        events: UnboundedSender<WidgetEvent>,
    ) -> Box<dyn PlayerWidget> {
        Box::new(MpvWidget::spawn(video_id, settings, events))
    }
}

pub struct MpvWidget {
    commands: UnboundedSender<String>,
    child: Option<Child>,
    socket_path: PathBuf,
    position: Arc<Mutex<f64>>,
    duration: Arc<Mutex<f64>>,
}

impl MpvWidget {
    fn spawn(
        video_id: &str,
        settings: WidgetSettings,
        events: UnboundedSender<WidgetEvent>,
    ) -> Self {
        let socket_path = std::env::temp_dir().join(format!(
            "kestrel-mpv-{}-{}",
            std::process::id(),
            WIDGET_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let url = format!("https://www.youtube.com/watch?v={}", video_id);

        let mut cmd = Command::new("mpv");
        cmd.arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg("--no-config")
            .arg("--force-window=yes")
            .arg("--geometry=960x540")
            .arg(format!("--title={}", settings.window_title));

        if settings.autoplay {
            cmd.arg("--pause=no");
        } else {
            cmd.arg("--pause=yes");
        }

        if !settings.native_controls {
            // The application is the only control surface.
            cmd.arg("--no-osc")
                .arg("--no-osd-bar")
                .arg("--input-default-bindings=no");
        }

        cmd.arg(&url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let (commands, command_rx) = unbounded_channel();
        let position = Arc::new(Mutex::new(0.0));
        let duration = Arc::new(Mutex::new(0.0));

        let child = match cmd.spawn() {
            Ok(child) => {
                debug!("spawned mpv for {} (ipc {})", video_id, socket_path.display());
                tokio::spawn(drive(
                    socket_path.clone(),
                    command_rx,
                    events,
                    position.clone(),
                    duration.clone(),
                ));
                Some(child)
            }
            Err(e) => {
                // The widget never signals ready; the session stays loading.
                warn!("failed to spawn mpv: {}", e);
                None
            }
        };

        Self {
            commands,
            child,
            socket_path,
            position,
            duration,
        }
    }

    fn send(&self, command: Value) {
        if self
            .commands
            .send(json!({ "command": command }).to_string())
            .is_err()
        {
            debug!("mpv command dropped; player is gone");
        }
    }

    fn set_property(&self, name: &str, value: Value) {
        self.send(json!(["set_property", name, value]));
    }
}

impl PlayerWidget for MpvWidget {
    fn play(&mut self) {
        self.set_property("pause", json!(false));
    }

    fn pause(&mut self) {
        self.set_property("pause", json!(true));
    }

    fn stop(&mut self) {
        self.set_property("pause", json!(true));
        self.send(json!(["seek", 0, "absolute"]));
    }

    fn mute(&mut self) {
        self.set_property("mute", json!(true));
    }

    fn unmute(&mut self) {
        self.set_property("mute", json!(false));
    }

    fn set_volume(&mut self, volume: u8) {
        self.set_property("volume", json!(volume));
    }

    fn seek_to(&mut self, seconds: f64) {
        self.send(json!(["seek", seconds, "absolute"]));
    }

    fn current_time(&self) -> f64 {
        *self.position.lock().unwrap()
    }

    fn duration(&self) -> f64 {
        *self.duration.lock().unwrap()
    }

    fn request_pip(&mut self) -> Result<()> {
        // Our picture-in-picture is a small always-on-top player window; it
        // needs a live command channel to the player surface.
        if self.child.is_none() || self.commands.is_closed() {
            return Err(Error::PipUnavailable);
        }
        self.set_property("ontop", json!(true));
        self.set_property("window-scale", json!(0.35));
        Ok(())
    }

    fn exit_pip(&mut self) {
        self.set_property("ontop", json!(false));
        self.set_property("window-scale", json!(1.0));
    }

    fn toggle_fullscreen(&mut self) {
        self.send(json!(["cycle", "fullscreen"]));
    }

    fn destroy(&mut self) {
        if let Some(mut child) = self.child.take() {
            self.send(json!(["quit"]));
            let _ = child.start_kill();
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for MpvWidget {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Owns the IPC socket for one mpv instance: writes queued commands, reads
/// events, keeps the shared position/duration caches current.
async fn drive(
    socket_path: PathBuf,
    mut commands: UnboundedReceiver<String>,
    events: UnboundedSender<WidgetEvent>,
    position: Arc<Mutex<f64>>,
    duration: Arc<Mutex<f64>>,
) {
    let Some(stream) = connect(&socket_path).await else {
        warn!("could not reach mpv ipc socket at {}", socket_path.display());
        return;
    };

    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    for (id, property) in [
        (1, "time-pos"),
        (2, "duration"),
        (3, "pause"),
        (4, "eof-reached"),
        (5, "paused-for-cache"),
        (6, "ontop"),
    ] {
        let observe = json!({ "command": ["observe_property", id, property] }).to_string();
        if write_line(&mut write_half, &observe).await.is_err() {
            return;
        }
    }

    // Events before the file has loaded are withheld so the adapter sees
    // ready before any state change.
    let mut ready_sent = false;
    let mut paused = false;

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(line) => {
                    if write_line(&mut write_half, &line).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => handle_message(
                    &line,
                    &events,
                    &position,
                    &duration,
                    &mut ready_sent,
                    &mut paused,
                ),
                _ => break,
            },
        }
    }

    debug!("mpv ipc loop for {} ended", socket_path.display());
}

/// mpv creates the socket shortly after startup.
async fn connect(path: &Path) -> Option<UnixStream> {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return Some(stream);
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    None
}

async fn write_line(write_half: &mut OwnedWriteHalf, line: &str) -> std::io::Result<()> {
    write_half.write_all(line.as_bytes()).await?;
    write_half.write_all(b"\n").await?;
    write_half.flush().await
}

fn handle_message(
    line: &str,
    events: &UnboundedSender<WidgetEvent>,
    position: &Arc<Mutex<f64>>,
    duration: &Arc<Mutex<f64>>,
    ready_sent: &mut bool,
    paused: &mut bool,
) {
    let Ok(message) = serde_json::from_str::<Value>(line) else {
        return;
    };

    match message["event"].as_str() {
        Some("file-loaded") => {
            if !*ready_sent {
                *ready_sent = true;
                let _ = events.send(WidgetEvent::Ready);
            }
        }
        Some("property-change") => {
            let data = &message["data"];
            match message["name"].as_str() {
                Some("time-pos") => {
                    if let Some(value) = data.as_f64() {
                        *position.lock().unwrap() = value;
                    }
                }
                Some("duration") => {
                    if let Some(value) = data.as_f64() {
                        *duration.lock().unwrap() = value;
                    }
                }
                Some("pause") => {
                    if let Some(value) = data.as_bool() {
                        *paused = value;
                        if *ready_sent {
                            let state = if value {
                                PlayState::Paused
                            } else {
                                PlayState::Playing
                            };
                            let _ = events.send(WidgetEvent::StateChange(state));
                        }
                    }
                }
                Some("paused-for-cache") => {
                    if *ready_sent {
                        match data.as_bool() {
                            Some(true) => {
                                let _ = events.send(WidgetEvent::StateChange(PlayState::Buffering));
                            }
                            Some(false) => {
                                // Buffering ended; report the underlying state.
                                let state = if *paused {
                                    PlayState::Paused
                                } else {
                                    PlayState::Playing
                                };
                                let _ = events.send(WidgetEvent::StateChange(state));
                            }
                            None => {}
                        }
                    }
                }
                Some("eof-reached") => {
                    if *ready_sent && data.as_bool() == Some(true) {
                        let _ = events.send(WidgetEvent::StateChange(PlayState::Ended));
                    }
                }
                Some("ontop") => {
                    // Dropping out of the floating window, by any means,
                    // ends picture-in-picture.
                    if data.as_bool() == Some(false) {
                        let _ = events.send(WidgetEvent::PipExited);
                    }
                }
                _ => {}
            }
        }
        _ => {}
    }
}
