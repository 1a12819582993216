use iced::{
    Element, Task,
    widget::{button, column, container, image, row, scrollable, slider, text, text_input, Image},
    Length, Subscription,
    keyboard,
    event,
};
use iced::widget::text_input::Id as TextInputId;
use std::collections::HashMap;
use tokio_stream::wrappers::UnboundedReceiverStream;

mod config;
mod error;
mod format;
mod mpv;
mod player;
mod youtube;

use config::Config;
use error::Error;
use player::{Adapter, DisplayMode, LoadOutcome, Phase, WidgetEvent};
use youtube::Video;

// Placeholder cards shown while a search is in flight.
const LOADING_PLACEHOLDERS: usize = 8;

async fn load_thumbnail(url: &str) -> Result<image::Handle, String> {
    let bytes = reqwest::get(url)
        .await
        .map_err(|e| format!("Failed to download thumbnail: {}", e))?
        .bytes()
        .await
        .map_err(|e| format!("Failed to read thumbnail bytes: {}", e))?;

    Ok(image::Handle::from_bytes(bytes))
}

pub fn main() -> iced::Result {
    env_logger::init();
    iced::application("Kestrel - YouTube Player", Kestrel::update, Kestrel::view)
        .subscription(Kestrel::subscription)
        .theme(|_| iced::Theme::TokyoNightStorm)
        .run_with(Kestrel::new)
}

#[derive(Debug, Clone)]
enum Message {
    SearchInputChanged(String),
    SearchPressed,
    SearchCompleted(Result<Vec<Video>, Error>),
    ThumbnailLoaded(String, Result<image::Handle, String>),
    VideoSelected(Video),
    HostProbed(Result<(), String>), // one-shot player availability check
    PlayerEvent(WidgetEvent),
    PollTick, // playback position poll while playing
    PlayPressed,
    PausePressed,
    StopPressed,
    MuteToggled,
    VolumeChanged(f64), // 0-100
    SeekChanged(f64),   // slider dragged; display-only until released
    SeekReleased,
    PipPressed,
    FullscreenPressed,
    ToggleMinimize,
    ClosePlayer,
    ToggleSettings,
    ApiKeyChanged(String),
    SaveSettings,
    KeyboardEvent(keyboard::Event),
}

struct Kestrel {
    search_query: String,
    search_results: Vec<Video>,
    is_searching: bool,
    error_message: Option<String>, // search-path failures, one banner at a time
    notice: Option<String>,        // recoverable player notices (PiP etc.)
    thumbnails: HashMap<String, image::Handle>,
    client: youtube::Client,
    config: Config,
    player: Adapter,
    show_settings: bool,
    api_key_input: String,
    search_input_id: TextInputId,
}

impl Kestrel {
    fn new() -> (Self, Task<Message>) {
        let config = Config::load();
        let client = youtube::Client::new(config.resolve_api_key());

        let search_input_id = TextInputId::unique();
        let focus_task = text_input::focus(search_input_id.clone());

        let app = Self {
            search_query: String::new(),
            search_results: Vec::new(),
            is_searching: false,
            error_message: None,
            notice: None,
            thumbnails: HashMap::new(),
            client,
            config,
            player: Adapter::new(Box::new(mpv::MpvHost)),
            show_settings: false,
            api_key_input: String::new(),
            search_input_id,
        };

        (app, focus_task)
    }
}

impl Kestrel {
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SearchInputChanged(value) => {
                self.search_query = value;
                self.error_message = None;
                Task::none()
            }
            Message::SearchPressed => {
                let query = self.search_query.trim().to_string();
                if query.is_empty() || self.is_searching {
                    return Task::none();
                }

                self.is_searching = true;
                self.error_message = None;
                let client = self.client.clone();

                Task::perform(
                    async move { client.search_videos(&query).await },
                    Message::SearchCompleted,
                )
            }
            Message::SearchCompleted(result) => {
                self.is_searching = false;
                match result {
                    Ok(videos) => {
                        self.search_results = videos;

                        // Load thumbnails for all results
                        let thumbnail_tasks: Vec<_> = self
                            .search_results
                            .iter()
                            .filter(|video| !video.thumbnail.is_empty())
                            .map(|video| {
                                let url = video.thumbnail.clone();
                                let video_id = video.id.clone();
                                Task::perform(
                                    async move {
                                        match load_thumbnail(&url).await {
                                            Ok(handle) => (video_id, Ok(handle)),
                                            Err(e) => (video_id, Err(e)),
                                        }
                                    },
                                    |(video_id, result)| {
                                        Message::ThumbnailLoaded(video_id, result)
                                    },
                                )
                            })
                            .collect();

                        return Task::batch(thumbnail_tasks);
                    }
                    Err(e) => {
                        log::error!("search failed: {}", e);
                        self.error_message = Some(e.to_string());
                        self.search_results.clear();
                    }
                }
                Task::none()
            }
            Message::ThumbnailLoaded(video_id, result) => {
                if let Ok(handle) = result {
                    self.thumbnails.insert(video_id, handle);
                }
                Task::none()
            }
            Message::VideoSelected(video) => {
                self.notice = None;
                match self.player.load(video) {
                    LoadOutcome::AwaitingHost => {
                        Task::perform(mpv::probe(), Message::HostProbed)
                    }
                    LoadOutcome::Constructed(rx) => {
                        Task::run(UnboundedReceiverStream::new(rx), Message::PlayerEvent)
                    }
                }
            }
            Message::HostProbed(result) => match result {
                Ok(()) => match self.player.host_ready() {
                    Some(rx) => {
                        Task::run(UnboundedReceiverStream::new(rx), Message::PlayerEvent)
                    }
                    None => Task::none(),
                },
                Err(e) => {
                    log::warn!("player host unavailable: {}", e);
                    self.player.host_failed();
                    self.notice = Some(format!("Player unavailable: {}", e));
                    Task::none()
                }
            },
            Message::PlayerEvent(event) => {
                self.player.handle_event(event);
                Task::none()
            }
            Message::PollTick => {
                self.player.tick();
                Task::none()
            }
            Message::PlayPressed => {
                self.player.play();
                Task::none()
            }
            Message::PausePressed => {
                self.player.pause();
                Task::none()
            }
            Message::StopPressed => {
                self.player.stop();
                Task::none()
            }
            Message::MuteToggled => {
                self.player.toggle_mute();
                Task::none()
            }
            Message::VolumeChanged(volume) => {
                self.player.set_volume(volume.round() as u8);
                Task::none()
            }
            Message::SeekChanged(position) => {
                self.player.scrub(position);
                Task::none()
            }
            Message::SeekReleased => {
                self.player.scrub_end();
                Task::none()
            }
            Message::PipPressed => {
                match self.player.toggle_pip() {
                    Ok(()) => self.notice = None,
                    Err(e) => {
                        log::warn!("picture-in-picture failed: {}", e);
                        self.notice = Some(e.to_string());
                    }
                }
                Task::none()
            }
            Message::FullscreenPressed => {
                self.player.toggle_fullscreen();
                Task::none()
            }
            Message::ToggleMinimize => {
                if let Some(session) = self.player.session() {
                    let mode = match session.mode {
                        DisplayMode::Theater => DisplayMode::Minimized,
                        DisplayMode::Minimized => DisplayMode::Theater,
                    };
                    self.player.set_mode(mode);
                }
                Task::none()
            }
            Message::ClosePlayer => {
                self.player.close();
                Task::none()
            }
            Message::ToggleSettings => {
                self.show_settings = !self.show_settings;
                if self.show_settings {
                    self.api_key_input = self.config.api_key.clone().unwrap_or_default();
                }
                Task::none()
            }
            Message::ApiKeyChanged(value) => {
                self.api_key_input = value;
                Task::none()
            }
            Message::SaveSettings => {
                let trimmed = self.api_key_input.trim();
                self.config.api_key = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
                if let Err(e) = self.config.save() {
                    self.error_message = Some(format!("Failed to save config: {}", e));
                } else {
                    self.error_message = None;
                }
                self.client = youtube::Client::new(self.config.resolve_api_key());
                self.show_settings = false;
                Task::none()
            }
            Message::KeyboardEvent(event) => {
                if let keyboard::Event::KeyPressed {
                    key: keyboard::Key::Character(c),
                    modifiers,
                    ..
                } = event
                {
                    if modifiers.command() && c.as_ref() == "k" {
                        return text_input::focus(self.search_input_id.clone());
                    }
                }
                Task::none()
            }
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let keyboard_events = event::listen().map(|event| {
            if let event::Event::Keyboard(keyboard_event) = event {
                Message::KeyboardEvent(keyboard_event)
            } else {
                Message::KeyboardEvent(keyboard::Event::KeyReleased {
                    key: keyboard::Key::Character("".into()),
                    modifiers: keyboard::Modifiers::default(),
                    location: keyboard::Location::Standard,
                })
            }
        });

        if self.player.is_polling() {
            Subscription::batch([
                keyboard_events,
                iced::time::every(std::time::Duration::from_millis(player::POLL_INTERVAL_MS))
                    .map(|_| Message::PollTick),
            ])
        } else {
            keyboard_events
        }
    }

    fn view(&self) -> Element<'_, Message> {
        if self.show_settings {
            return self.settings_view();
        }

        let title = text("Kestrel")
            .size(32)
            .width(Length::Fill);

        let settings_button = button(text("⚙").size(24))
            .on_press(Message::ToggleSettings)
            .padding(8);

        let title_row = row![title, settings_button]
            .spacing(10)
            .width(Length::Fill);

        let mut search_input = text_input("Search videos...", &self.search_query)
            .padding(10)
            .size(16)
            .width(Length::Fill)
            .id(self.search_input_id.clone());

        // Input and submit are both disabled while a search is in flight.
        if !self.is_searching {
            search_input = search_input
                .on_input(Message::SearchInputChanged)
                .on_submit(Message::SearchPressed);
        }

        let can_search = !self.is_searching && !self.search_query.trim().is_empty();
        let search_button = button(
            text(if self.is_searching {
                "Searching..."
            } else {
                "Search"
            })
            .size(16),
        )
        .on_press_maybe(if can_search {
            Some(Message::SearchPressed)
        } else {
            None
        })
        .padding(10);

        let search_row = row![search_input, search_button]
            .spacing(10)
            .width(Length::Fill);

        let mut header = column![title_row, search_row].spacing(20);

        if let Some(error) = &self.error_message {
            header = header.push(
                text(error)
                    .size(14)
                    .style(|_theme| text::Style {
                        color: Some(iced::Color::from_rgb(0.8, 0.2, 0.2)),
                    }),
            );
        }

        if let Some(notice) = &self.notice {
            header = header.push(
                text(notice)
                    .size(14)
                    .style(|_theme| text::Style {
                        color: Some(iced::Color::from_rgb(0.85, 0.65, 0.2)),
                    }),
            );
        }

        let mut content = column![header].spacing(20).padding(20);

        if let Some(session) = self.player.session() {
            if session.mode == DisplayMode::Theater {
                content = content.push(self.player_panel(session));
            }
        }

        content = content.push(self.results_view());

        if let Some(session) = self.player.session() {
            if session.mode == DisplayMode::Minimized {
                content = content.push(self.minimized_bar(session));
            }
        }

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn results_view(&self) -> Element<'_, Message> {
        if self.is_searching {
            let mut placeholders = column![].spacing(10);
            for _ in 0..LOADING_PLACEHOLDERS {
                placeholders = placeholders.push(self.placeholder_card());
            }
            return scrollable(placeholders)
                .width(Length::Fill)
                .height(Length::Fill)
                .into();
        }

        if self.search_results.is_empty() {
            return column![
                text("Search for videos above")
                    .size(18)
                    .style(|_theme| text::Style {
                        color: Some(iced::Color::from_rgb(0.6, 0.6, 0.6)),
                    }),
                text("Results will show up here")
                    .size(14)
                    .style(|_theme| text::Style {
                        color: Some(iced::Color::from_rgb(0.45, 0.45, 0.45)),
                    }),
            ]
            .spacing(8)
            .width(Length::Fill)
            .into();
        }

        let selected_id = self
            .player
            .session()
            .map(|session| session.video.id.clone());
        let mut results_list = column![].spacing(10);
        for video in &self.search_results {
            let is_active = selected_id.as_deref() == Some(video.id.as_str());
            results_list = results_list.push(self.result_card(video, is_active));
        }

        scrollable(results_list)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn result_card(&self, video: &Video, is_active: bool) -> Element<'_, Message> {
        let thumbnail: Element<'_, Message> =
            if let Some(handle) = self.thumbnails.get(&video.id) {
                Image::new(handle.clone()).width(160).height(90).into()
            } else {
                container(text("Loading...").size(10))
                    .width(160)
                    .height(90)
                    .center_x(160)
                    .center_y(90)
                    .style(|_theme| container::Style {
                        background: Some(iced::Background::Color(iced::Color::from_rgb(
                            0.2, 0.2, 0.22,
                        ))),
                        ..Default::default()
                    })
                    .into()
            };

        let views_label = format::view_count(video.views);
        let duration_label = format::duration(&video.duration);
        let meta_label = if duration_label.is_empty() {
            views_label
        } else {
            format!("{} | {}", views_label, duration_label)
        };

        let info = column![
            text(video.title.clone()).size(16).width(Length::Fill),
            text(video.channel.clone())
                .size(14)
                .style(|_theme| text::Style {
                    color: Some(iced::Color::from_rgb(0.6, 0.6, 0.6)),
                }),
            text(meta_label)
                .size(14)
                .style(|_theme| text::Style {
                    color: Some(iced::Color::from_rgb(0.6, 0.6, 0.6)),
                }),
        ]
        .spacing(5)
        .width(Length::Fill);

        let card = row![thumbnail, info].spacing(15);

        button(card)
            .on_press(Message::VideoSelected(video.clone()))
            .padding(15)
            .width(Length::Fill)
            .style(move |_theme, status| button::Style {
                background: Some(iced::Background::Color(match status {
                    button::Status::Hovered => iced::Color::from_rgb(0.18, 0.18, 0.22),
                    _ => iced::Color::from_rgb(0.15, 0.15, 0.18),
                })),
                text_color: iced::Color::from_rgb(0.9, 0.9, 0.9),
                border: iced::Border {
                    color: if is_active {
                        iced::Color::from_rgb(0.4, 0.6, 0.9)
                    } else {
                        iced::Color::from_rgb(0.25, 0.25, 0.3)
                    },
                    width: 1.0,
                    radius: 5.0.into(),
                },
                shadow: iced::Shadow::default(),
            })
            .into()
    }

    fn placeholder_card(&self) -> Element<'_, Message> {
        let thumb_box = container(text(""))
            .width(160)
            .height(90)
            .style(|_theme| container::Style {
                background: Some(iced::Background::Color(iced::Color::from_rgb(
                    0.2, 0.2, 0.22,
                ))),
                ..Default::default()
            });

        let lines = column![
            container(text(""))
                .width(Length::Fixed(320.0))
                .height(16)
                .style(placeholder_line),
            container(text(""))
                .width(Length::Fixed(200.0))
                .height(14)
                .style(placeholder_line),
            container(text(""))
                .width(Length::Fixed(140.0))
                .height(14)
                .style(placeholder_line),
        ]
        .spacing(8);

        container(row![thumb_box, lines].spacing(15))
            .padding(15)
            .width(Length::Fill)
            .style(|_theme| container::Style {
                background: Some(iced::Background::Color(iced::Color::from_rgb(
                    0.15, 0.15, 0.18,
                ))),
                border: iced::Border {
                    color: iced::Color::from_rgb(0.25, 0.25, 0.3),
                    width: 1.0,
                    radius: 5.0.into(),
                },
                ..Default::default()
            })
            .into()
    }

    fn player_panel(&self, session: &player::Session) -> Element<'_, Message> {
        let title = text(session.video.title.clone())
            .size(16)
            .width(Length::Fill);

        let minimize_button = button(text("Minimize").size(12))
            .on_press(Message::ToggleMinimize)
            .padding(6);

        let close_button = button(text("✕").size(14))
            .on_press(Message::ClosePlayer)
            .padding(6);

        let header = row![title, minimize_button, close_button]
            .spacing(10)
            .width(Length::Fill);

        let seek_max = if session.duration > 0.0 {
            session.duration
        } else {
            100.0
        };

        let seek_slider = slider(0.0..=seek_max, session.position, Message::SeekChanged)
            .step(0.5)
            .on_release(Message::SeekReleased)
            .width(Length::Fill);

        let seek_row = row![
            text(format::timestamp(session.position)).size(12),
            seek_slider,
            text(format::timestamp(session.duration)).size(12),
        ]
        .spacing(10)
        .width(Length::Fill);

        let play_pause = if session.is_playing() {
            button(text("Pause").size(14))
                .on_press(Message::PausePressed)
                .padding(8)
        } else {
            button(text("Play").size(14))
                .on_press(Message::PlayPressed)
                .padding(8)
        };

        let stop_button = button(text("Stop").size(14))
            .on_press(Message::StopPressed)
            .padding(8);

        let mute_button = button(
            text(if self.player.muted() { "Unmute" } else { "Mute" }).size(14),
        )
        .on_press(Message::MuteToggled)
        .padding(8);

        let shown_volume = if self.player.muted() {
            0.0
        } else {
            self.player.volume() as f64
        };
        let volume_slider = slider(0.0..=100.0, shown_volume, Message::VolumeChanged)
            .step(1.0)
            .width(Length::Fixed(120.0));

        let pip_active = self.player.pip_active();
        let pip_button = button(text("PiP").size(14))
            .on_press(Message::PipPressed)
            .padding(8)
            .style(move |theme, status| {
                let mut style = button::primary(theme, status);
                if pip_active {
                    style.border = iced::Border {
                        color: iced::Color::from_rgb(0.4, 0.6, 0.9),
                        width: 2.0,
                        radius: 3.0.into(),
                    };
                }
                style
            });

        let fullscreen_button = button(text("Fullscreen").size(14))
            .on_press(Message::FullscreenPressed)
            .padding(8);

        let controls = row![
            play_pause,
            stop_button,
            mute_button,
            volume_slider,
            pip_button,
            fullscreen_button,
        ]
        .spacing(10);

        let mut panel = column![header, seek_row, controls].spacing(12);

        if matches!(session.phase, Phase::Initializing | Phase::Loading) {
            panel = panel.push(
                text("Loading player...")
                    .size(13)
                    .style(|_theme| text::Style {
                        color: Some(iced::Color::from_rgb(0.4, 0.6, 0.9)),
                    }),
            );
        }

        container(panel)
            .padding(15)
            .width(Length::Fill)
            .style(|_theme| container::Style {
                background: Some(iced::Background::Color(iced::Color::from_rgb(
                    0.12, 0.12, 0.15,
                ))),
                border: iced::Border {
                    color: iced::Color::from_rgb(0.3, 0.3, 0.36),
                    width: 1.0,
                    radius: 5.0.into(),
                },
                ..Default::default()
            })
            .into()
    }

    fn minimized_bar(&self, session: &player::Session) -> Element<'_, Message> {
        let title = text(session.video.title.clone())
            .size(14)
            .width(Length::Fill);

        let state_label = text(if session.is_playing() { "Playing" } else { "Paused" })
            .size(12)
            .style(|_theme| text::Style {
                color: Some(iced::Color::from_rgb(0.6, 0.6, 0.6)),
            });

        let restore_button = button(text("Expand").size(12))
            .on_press(Message::ToggleMinimize)
            .padding(6);

        let close_button = button(text("✕").size(12))
            .on_press(Message::ClosePlayer)
            .padding(6);

        container(
            row![title, state_label, restore_button, close_button]
                .spacing(10)
                .width(Length::Fill),
        )
        .padding(10)
        .width(Length::Fill)
        .style(|_theme| container::Style {
            background: Some(iced::Background::Color(iced::Color::from_rgb(
                0.12, 0.12, 0.15,
            ))),
            border: iced::Border {
                color: iced::Color::from_rgb(0.3, 0.3, 0.36),
                width: 1.0,
                radius: 5.0.into(),
            },
            ..Default::default()
        })
        .into()
    }

    fn settings_view(&self) -> Element<'_, Message> {
        let title = text("Settings").size(32);

        let back_button = button(text("← Back"))
            .on_press(Message::ToggleSettings)
            .padding(10);

        let header = row![back_button, title]
            .spacing(20)
            .width(Length::Fill);

        let key_label = text("YouTube API Key:").size(18);

        let key_input = text_input("API key", &self.api_key_input)
            .on_input(Message::ApiKeyChanged)
            .on_submit(Message::SaveSettings)
            .padding(10)
            .size(16)
            .width(Length::Fixed(500.0));

        let key_hint = text("Falls back to the YOUTUBE_API_KEY environment variable when empty")
            .size(14)
            .style(|_theme| text::Style {
                color: Some(iced::Color::from_rgb(0.5, 0.5, 0.5)),
            });

        let save_button = button(text("Save"))
            .on_press(Message::SaveSettings)
            .padding(10);

        let settings_content = column![
            header,
            column![key_label, key_input, key_hint, save_button]
                .spacing(10)
                .padding(20),
        ]
        .spacing(20)
        .width(Length::Fill);

        container(settings_content)
            .padding(20)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }
}

fn placeholder_line(_theme: &iced::Theme) -> container::Style {
    container::Style {
        background: Some(iced::Background::Color(iced::Color::from_rgb(
            0.22, 0.22, 0.26,
        ))),
        border: iced::Border {
            color: iced::Color::TRANSPARENT,
            width: 0.0,
            radius: 3.0.into(),
        },
        ..Default::default()
    }
}
