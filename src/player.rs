//! Bridges UI transport commands to an external player widget.
//!
//! The widget itself (an embedded player the application does not control)
//! is reached only through the [`PlayerWidget`] command surface and the
//! [`WidgetEvent`] stream its host delivers, so the whole adapter can be
//! driven in tests by a fake widget. One widget instance exists per loaded
//! video; loading a different video always tears the old instance down
//! before constructing the next.

use log::{debug, info};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{Error, Result};
use crate::youtube::Video;

/// Interval of the playback-position poll while a video is playing.
pub const POLL_INTERVAL_MS: u64 = 500;

const DEFAULT_VOLUME: u8 = 80;

/// Widget-reported playback states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

/// Events the widget host delivers over the session's event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetEvent {
    /// The widget finished constructing and accepted its video.
    Ready,
    StateChange(PlayState),
    /// Picture-in-picture ended, by whatever means.
    PipExited,
}

/// Session lifecycle. `Destroyed` is terminal for a session; a new session
/// starts over at `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Initializing,
    Loading,
    Playing,
    Paused,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Theater,
    Minimized,
}

/// Construction-time widget configuration.
#[derive(Debug, Clone)]
pub struct WidgetSettings {
    pub window_title: String,
    pub autoplay: bool,
    pub native_controls: bool,
}

/// Command surface of one live widget instance. Commands are fire-and-forget
/// and best-effort; `current_time`/`duration` read the widget's last
/// reported values.
pub trait PlayerWidget: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn mute(&mut self);
    fn unmute(&mut self);
    fn set_volume(&mut self, volume: u8);
    fn seek_to(&mut self, seconds: f64);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn request_pip(&mut self) -> Result<()>;
    fn exit_pip(&mut self);
    fn toggle_fullscreen(&mut self);
    fn destroy(&mut self);
}

/// Constructs widget instances. Availability of the hosting machinery is
/// confirmed once (asynchronously, by the caller) before the first
/// construction; afterwards construction is synchronous.
pub trait WidgetHost: Send {
    fn construct(
        &self,
        video_id: &str,
        settings: WidgetSettings,
        events: UnboundedSender<WidgetEvent>,
    ) -> Box<dyn PlayerWidget>;
}

/// What a `load` needs from the caller next.
pub enum LoadOutcome {
    /// Host availability is not yet confirmed; probe it and report back
    /// through [`Adapter::host_ready`] or [`Adapter::host_failed`].
    AwaitingHost,
    /// The widget was constructed; feed these events back into the adapter.
    Constructed(UnboundedReceiver<WidgetEvent>),
}

/// The currently loaded video and its transport state.
pub struct Session {
    pub video: Video,
    pub phase: Phase,
    pub position: f64,
    pub duration: f64,
    pub mode: DisplayMode,
    widget: Option<Box<dyn PlayerWidget>>,
}

impl Session {
    fn new(video: Video) -> Self {
        Self {
            video,
            phase: Phase::Initializing,
            position: 0.0,
            duration: 0.0,
            mode: DisplayMode::Theater,
            widget: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }
}

pub struct Adapter {
    host: Box<dyn WidgetHost>,
    host_confirmed: bool,
    session: Option<Session>,
    /// Explicit guard: while the user drags the seek slider, position
    /// polling must not overwrite the displayed position.
    dragging: bool,
    pip_active: bool,
    /// Last non-zero volume; restored on unmute.
    volume: u8,
    muted: bool,
}

impl Adapter {
    pub fn new(host: Box<dyn WidgetHost>) -> Self {
        Self {
            host,
            host_confirmed: false,
            session: None,
            dragging: false,
            pip_active: false,
            volume: DEFAULT_VOLUME,
            muted: false,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn pip_active(&self) -> bool {
        self.pip_active
    }

    /// True while the position poll should be scheduled.
    pub fn is_polling(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_playing)
    }

    /// Load a video, replacing any active session. The previous widget is
    /// destroyed before anything new is constructed.
    pub fn load(&mut self, video: Video) -> LoadOutcome {
        self.teardown();
        info!("loading video {}", video.id);
        self.session = Some(Session::new(video));

        if !self.host_confirmed {
            LoadOutcome::AwaitingHost
        } else {
            LoadOutcome::Constructed(self.construct())
        }
    }

    /// One-shot host availability confirmation. Constructs the pending
    /// widget if a session is still waiting on it.
    pub fn host_ready(&mut self) -> Option<UnboundedReceiver<WidgetEvent>> {
        self.host_confirmed = true;
        let pending = self
            .session
            .as_ref()
            .is_some_and(|session| session.phase == Phase::Initializing);
        if pending {
            Some(self.construct())
        } else {
            None
        }
    }

    /// The host probe failed; drop the pending session.
    pub fn host_failed(&mut self) {
        self.teardown();
    }

    fn construct(&mut self) -> UnboundedReceiver<WidgetEvent> {
        let (tx, rx) = unbounded_channel();
        if let Some(session) = self.session.as_mut() {
            let settings = WidgetSettings {
                window_title: session.video.title.clone(),
                autoplay: true,
                native_controls: false,
            };
            session.widget = Some(self.host.construct(&session.video.id, settings, tx));
            session.phase = Phase::Loading;
        }
        rx
    }

    pub fn handle_event(&mut self, event: WidgetEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(widget) = session.widget.as_mut() else {
            return;
        };

        match event {
            WidgetEvent::Ready => {
                debug!("widget ready for {}", session.video.id);
                widget.set_volume(if self.muted { 0 } else { self.volume });
                if self.muted {
                    widget.mute();
                }
                widget.play();
                session.duration = widget.duration();
                // Optimistic; the next state-change event corrects it.
                session.phase = Phase::Playing;
            }
            WidgetEvent::StateChange(state) => {
                session.phase = if state == PlayState::Playing {
                    Phase::Playing
                } else {
                    Phase::Paused
                };
                // Duration may only become known once playback has buffered.
                let duration = widget.duration();
                if duration > 0.0 {
                    session.duration = duration;
                }
            }
            WidgetEvent::PipExited => {
                self.pip_active = false;
            }
        }
    }

    /// One position-poll step. Skipped while the seek slider is dragged so
    /// the poller does not fight the user.
    pub fn tick(&mut self) {
        if self.dragging {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if session.phase == Phase::Playing {
                if let Some(widget) = session.widget.as_ref() {
                    session.position = widget.current_time();
                }
            }
        }
    }

    pub fn play(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(widget) = session.widget.as_mut() else {
            return;
        };
        widget.play();
        session.phase = Phase::Playing;
    }

    pub fn pause(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(widget) = session.widget.as_mut() else {
            return;
        };
        widget.pause();
        session.phase = Phase::Paused;
    }

    pub fn stop(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(widget) = session.widget.as_mut() else {
            return;
        };
        widget.stop();
        session.phase = Phase::Paused;
        session.position = 0.0;
    }

    pub fn toggle_mute(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(widget) = session.widget.as_mut() else {
            return;
        };
        if self.muted {
            widget.unmute();
            widget.set_volume(self.volume);
        } else {
            widget.mute();
        }
        self.muted = !self.muted;
    }

    /// Zero volume implies mute; any positive volume implies unmute and is
    /// remembered as the level unmute restores.
    pub fn set_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(widget) = session.widget.as_mut() else {
            return;
        };
        widget.set_volume(volume);
        if volume == 0 {
            widget.mute();
            self.muted = true;
        } else {
            widget.unmute();
            self.muted = false;
            self.volume = volume;
        }
    }

    /// Seek drag protocol: `scrub` moves only the displayed position while
    /// polling write-back stays suspended; `scrub_end` commits the seek.
    pub fn scrub_start(&mut self) {
        self.dragging = true;
    }

    pub fn scrub(&mut self, position: f64) {
        self.dragging = true;
        if let Some(session) = self.session.as_mut() {
            session.position = position;
        }
    }

    pub fn scrub_end(&mut self) {
        self.dragging = false;
        if let Some(session) = self.session.as_mut() {
            let target = session.position;
            if let Some(widget) = session.widget.as_mut() {
                widget.seek_to(target);
            }
            // Snap to the committed target; the poller takes over from here.
            session.position = target;
        }
    }

    /// Best-effort picture-in-picture toggle. Failure is recoverable and
    /// surfaces as a notice, never as a fatal error.
    pub fn toggle_pip(&mut self) -> Result<()> {
        if self.pip_active {
            if let Some(widget) = self.session.as_mut().and_then(|s| s.widget.as_mut()) {
                widget.exit_pip();
            }
            self.pip_active = false;
            return Ok(());
        }

        let Some(widget) = self.session.as_mut().and_then(|s| s.widget.as_mut()) else {
            return Err(Error::PipUnavailable);
        };
        widget.request_pip()?;
        self.pip_active = true;
        Ok(())
    }

    pub fn toggle_fullscreen(&mut self) {
        if let Some(widget) = self.session.as_mut().and_then(|s| s.widget.as_mut()) {
            widget.toggle_fullscreen();
        }
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        if let Some(session) = self.session.as_mut() {
            session.mode = mode;
        }
    }

    /// Close the player and destroy the widget.
    pub fn close(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.dragging = false;
        self.pip_active = false;
        if let Some(mut session) = self.session.take() {
            // Taking the widget guards against double-destroy; destruction
            // errors are the widget's to swallow.
            if let Some(mut widget) = session.widget.take() {
                debug!("destroying widget for {}", session.video.id);
                widget.destroy();
            }
            session.phase = Phase::Destroyed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sample_video(id: &str) -> Video {
        Video {
            id: id.to_string(),
            title: format!("Video {}", id),
            channel: "Channel".to_string(),
            thumbnail: String::new(),
            duration: "PT5M9S".to_string(),
            views: Some(100),
        }
    }

    /// Shared journal of widget/host calls, in order.
    type Journal = Arc<Mutex<Vec<String>>>;

    struct FakeWidget {
        id: String,
        journal: Journal,
        current_time: Arc<Mutex<f64>>,
        duration: Arc<Mutex<f64>>,
        pip_ok: bool,
    }

    impl FakeWidget {
        fn log(&self, entry: String) {
            self.journal.lock().unwrap().push(entry);
        }
    }

    impl PlayerWidget for FakeWidget {
        fn play(&mut self) {
            self.log(format!("play:{}", self.id));
        }
        fn pause(&mut self) {
            self.log(format!("pause:{}", self.id));
        }
        fn stop(&mut self) {
            self.log(format!("stop:{}", self.id));
        }
        fn mute(&mut self) {
            self.log(format!("mute:{}", self.id));
        }
        fn unmute(&mut self) {
            self.log(format!("unmute:{}", self.id));
        }
        fn set_volume(&mut self, volume: u8) {
            self.log(format!("volume:{}:{}", self.id, volume));
        }
        fn seek_to(&mut self, seconds: f64) {
            self.log(format!("seek:{}:{}", self.id, seconds));
        }
        fn current_time(&self) -> f64 {
            *self.current_time.lock().unwrap()
        }
        fn duration(&self) -> f64 {
            *self.duration.lock().unwrap()
        }
        fn request_pip(&mut self) -> Result<()> {
            self.log(format!("pip:{}", self.id));
            if self.pip_ok {
                Ok(())
            } else {
                Err(Error::PipUnavailable)
            }
        }
        fn exit_pip(&mut self) {
            self.log(format!("exit_pip:{}", self.id));
        }
        fn toggle_fullscreen(&mut self) {
            self.log(format!("fullscreen:{}", self.id));
        }
        fn destroy(&mut self) {
            self.log(format!("destroy:{}", self.id));
        }
    }

    struct FakeHost {
        journal: Journal,
        current_time: Arc<Mutex<f64>>,
        duration: Arc<Mutex<f64>>,
        pip_ok: bool,
    }

    impl FakeHost {
        fn new() -> Self {
            Self {
                journal: Arc::new(Mutex::new(Vec::new())),
                current_time: Arc::new(Mutex::new(0.0)),
                duration: Arc::new(Mutex::new(0.0)),
                pip_ok: true,
            }
        }
    }

    impl WidgetHost for FakeHost {
        fn construct(
            &self,
            video_id: &str,
            _settings: WidgetSettings,
            _events: UnboundedSender<WidgetEvent>,
        ) -> Box<dyn PlayerWidget> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("construct:{}", video_id));
            Box::new(FakeWidget {
                id: video_id.to_string(),
                journal: self.journal.clone(),
                current_time: self.current_time.clone(),
                duration: self.duration.clone(),
                pip_ok: self.pip_ok,
            })
        }
    }

    fn ready_adapter() -> (Adapter, Journal, Arc<Mutex<f64>>, Arc<Mutex<f64>>) {
        let host = FakeHost::new();
        let journal = host.journal.clone();
        let current_time = host.current_time.clone();
        let duration = host.duration.clone();
        let mut adapter = Adapter::new(Box::new(host));
        adapter.load(sample_video("a"));
        adapter.host_ready();
        (adapter, journal, current_time, duration)
    }

    #[test]
    fn first_load_awaits_host_then_constructs() {
        let host = FakeHost::new();
        let journal = host.journal.clone();
        let mut adapter = Adapter::new(Box::new(host));

        assert!(matches!(
            adapter.load(sample_video("a")),
            LoadOutcome::AwaitingHost
        ));
        assert!(journal.lock().unwrap().is_empty());
        assert_eq!(adapter.session().unwrap().phase, Phase::Initializing);

        assert!(adapter.host_ready().is_some());
        assert_eq!(adapter.session().unwrap().phase, Phase::Loading);

        // Availability is confirmed once; later loads construct directly.
        assert!(matches!(
            adapter.load(sample_video("b")),
            LoadOutcome::Constructed(_)
        ));
    }

    #[test]
    fn selecting_a_new_video_destroys_the_old_widget_first() {
        let (mut adapter, journal, _, _) = ready_adapter();

        adapter.load(sample_video("b"));

        let journal = journal.lock().unwrap();
        assert_eq!(
            *journal,
            vec!["construct:a", "destroy:a", "construct:b"],
            "exactly one live widget at a time"
        );
    }

    #[test]
    fn load_resets_transport_fields() {
        let (mut adapter, _, current_time, duration) = ready_adapter();
        *duration.lock().unwrap() = 300.0;
        *current_time.lock().unwrap() = 120.0;
        adapter.handle_event(WidgetEvent::Ready);
        adapter.handle_event(WidgetEvent::StateChange(PlayState::Playing));
        adapter.tick();

        adapter.load(sample_video("b"));
        let session = adapter.session().unwrap();
        assert_eq!(session.position, 0.0);
        assert_eq!(session.duration, 0.0);
        assert!(!session.is_playing());
    }

    #[test]
    fn ready_applies_volume_autoplay_and_duration() {
        let (mut adapter, journal, _, duration) = ready_adapter();
        *duration.lock().unwrap() = 240.0;

        adapter.handle_event(WidgetEvent::Ready);

        let journal = journal.lock().unwrap();
        assert!(journal.contains(&"volume:a:80".to_string()));
        assert!(journal.contains(&"play:a".to_string()));
        let session = adapter.session().unwrap();
        assert_eq!(session.duration, 240.0);
        assert!(session.is_playing());
    }

    #[test]
    fn state_change_corrects_playing_and_rereads_duration() {
        let (mut adapter, _, _, duration) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);

        adapter.handle_event(WidgetEvent::StateChange(PlayState::Buffering));
        assert!(!adapter.session().unwrap().is_playing());
        assert!(!adapter.is_polling());

        // Late metadata: duration becomes known on a later state change.
        *duration.lock().unwrap() = 613.0;
        adapter.handle_event(WidgetEvent::StateChange(PlayState::Playing));
        let session = adapter.session().unwrap();
        assert!(session.is_playing());
        assert_eq!(session.duration, 613.0);
        assert!(adapter.is_polling());
    }

    #[test]
    fn tick_updates_position_only_while_playing() {
        let (mut adapter, _, current_time, _) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);
        adapter.handle_event(WidgetEvent::StateChange(PlayState::Playing));

        *current_time.lock().unwrap() = 42.0;
        adapter.tick();
        assert_eq!(adapter.session().unwrap().position, 42.0);

        adapter.handle_event(WidgetEvent::StateChange(PlayState::Paused));
        *current_time.lock().unwrap() = 43.0;
        adapter.tick();
        assert_eq!(adapter.session().unwrap().position, 42.0);
    }

    #[test]
    fn dragging_suspends_poll_writeback_and_release_commits() {
        let (mut adapter, journal, current_time, _) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);
        adapter.handle_event(WidgetEvent::StateChange(PlayState::Playing));
        *current_time.lock().unwrap() = 42.0;

        adapter.scrub_start();
        adapter.scrub(10.0);
        adapter.tick();
        assert_eq!(
            adapter.session().unwrap().position,
            10.0,
            "poller must not fight the slider"
        );

        adapter.scrub(12.5);
        adapter.scrub_end();
        assert_eq!(adapter.session().unwrap().position, 12.5);
        assert!(journal.lock().unwrap().contains(&"seek:a:12.5".to_string()));

        // Write-back resumes after release.
        adapter.tick();
        assert_eq!(adapter.session().unwrap().position, 42.0);
    }

    #[test]
    fn volume_zero_mutes_and_positive_unmutes() {
        let (mut adapter, journal, _, _) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);

        adapter.set_volume(55);
        assert!(!adapter.muted());
        assert_eq!(adapter.volume(), 55);

        adapter.set_volume(0);
        assert!(adapter.muted());
        assert_eq!(adapter.volume(), 55, "last non-zero volume is preserved");
        assert!(journal.lock().unwrap().contains(&"mute:a".to_string()));
    }

    #[test]
    fn unmute_restores_last_nonzero_volume() {
        let (mut adapter, journal, _, _) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);

        adapter.set_volume(55);
        adapter.toggle_mute();
        assert!(adapter.muted());

        adapter.toggle_mute();
        assert!(!adapter.muted());
        let journal = journal.lock().unwrap();
        assert!(journal.contains(&"unmute:a".to_string()));
        assert!(journal.iter().rev().any(|e| e == "volume:a:55"));
    }

    #[test]
    fn stop_resets_position() {
        let (mut adapter, _, current_time, _) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);
        adapter.handle_event(WidgetEvent::StateChange(PlayState::Playing));
        *current_time.lock().unwrap() = 30.0;
        adapter.tick();

        adapter.stop();
        let session = adapter.session().unwrap();
        assert_eq!(session.position, 0.0);
        assert!(!session.is_playing());
    }

    #[test]
    fn commands_without_widget_are_silent_noops() {
        let host = FakeHost::new();
        let journal = host.journal.clone();
        let mut adapter = Adapter::new(Box::new(host));

        adapter.play();
        adapter.pause();
        adapter.stop();
        adapter.toggle_mute();
        adapter.set_volume(10);
        adapter.scrub_start();
        adapter.scrub(5.0);
        adapter.scrub_end();
        adapter.toggle_fullscreen();

        assert!(journal.lock().unwrap().is_empty());
        assert!(matches!(adapter.toggle_pip(), Err(Error::PipUnavailable)));
    }

    #[test]
    fn pip_toggles_and_clears_on_exit_event() {
        let (mut adapter, journal, _, _) = ready_adapter();
        adapter.handle_event(WidgetEvent::Ready);

        assert!(adapter.toggle_pip().is_ok());
        assert!(adapter.pip_active());

        // Exited by the host environment rather than by us.
        adapter.handle_event(WidgetEvent::PipExited);
        assert!(!adapter.pip_active());

        assert!(adapter.toggle_pip().is_ok());
        adapter.toggle_pip().unwrap();
        assert!(!adapter.pip_active());
        assert!(journal.lock().unwrap().contains(&"exit_pip:a".to_string()));
    }

    #[test]
    fn pip_failure_is_recoverable() {
        let mut host = FakeHost::new();
        host.pip_ok = false;
        let mut adapter = Adapter::new(Box::new(host));
        adapter.load(sample_video("a"));
        adapter.host_ready();
        adapter.handle_event(WidgetEvent::Ready);

        assert!(matches!(adapter.toggle_pip(), Err(Error::PipUnavailable)));
        assert!(!adapter.pip_active());
        // Playback state is untouched.
        assert!(adapter.session().unwrap().is_playing());
    }

    #[test]
    fn close_destroys_once() {
        let (mut adapter, journal, _, _) = ready_adapter();

        adapter.close();
        adapter.close();

        let destroys = journal
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("destroy:"))
            .count();
        assert_eq!(destroys, 1);
        assert!(adapter.session().is_none());
    }

    #[test]
    fn events_after_close_are_ignored() {
        let (mut adapter, _, _, _) = ready_adapter();
        adapter.close();
        adapter.handle_event(WidgetEvent::Ready);
        adapter.handle_event(WidgetEvent::StateChange(PlayState::Playing));
        assert!(adapter.session().is_none());
        assert!(!adapter.is_polling());
    }
}
