use std::time::Duration;

use iced::{
    Element, Length, Subscription, Task,
    widget::{button, column, container, row, scrollable, text},
};
use iced_widget::container::bordered_box;
use tracing::warn;

use super::{
    AppState, Message,
    screens::{
        Screen, ScreenMessage, Tab,
        batch::{BatchParentMessage, BatchScreen},
        single::SingleScreen,
    },
    widgets::tab_bar,
};
use crate::core::detection::BatchResult;

pub struct TumorscanApp {
    state: AppState,
    tab: Tab,
    batch: BatchScreen,
    single: SingleScreen,
    dev_panel: bool,
    backend_output: Vec<String>,
    last_results: Option<BatchResult>,
}

impl TumorscanApp {
    pub fn new(state: AppState) -> (Self, Task<Message>) {
        let restore = Task::perform(
            state.run(|shell| async move {
                shell.last_results().await.map_err(|e| format!("{e:#}"))
            }),
            |restored| match restored {
                Ok(results) => Message::RestoredResults(results),
                Err(err) => {
                    warn!(error = %err, "could not restore last results");
                    Message::RestoredResults(None)
                }
            },
        );
        let dev_panel = state.dev_mode;
        (
            Self {
                state,
                tab: Tab::default(),
                batch: BatchScreen::default(),
                single: SingleScreen::default(),
                dev_panel,
                backend_output: Vec::new(),
                last_results: None,
            },
            restore,
        )
    }

    /// Opens the main window and blocks until it is closed.
    pub fn run(state: AppState) -> iced::Result {
        iced::application(move || Self::new(state.clone()), Self::update, Self::view)
            .title("Brain Tumor Detector")
            .window_size((1200.0, 800.0))
            .subscription(Self::subscription)
            .run()
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.tab = tab;
                Task::none()
            }
            Message::Batch(ScreenMessage::ScreenMessage(msg)) => self
                .batch
                .update(msg, &mut self.state)
                .map(Message::Batch),
            Message::Batch(ScreenMessage::ParentMessage(BatchParentMessage::ResultsChanged(
                results,
            ))) => {
                self.last_results = Some(results);
                Task::none()
            }
            Message::Single(ScreenMessage::ScreenMessage(msg)) => self
                .single
                .update(msg, &mut self.state)
                .map(Message::Single),
            Message::Single(ScreenMessage::ParentMessage(never)) => match never {},
            Message::RestoredResults(Some(results)) => {
                self.last_results = Some(results.clone());
                self.batch.restore(results, &self.state).map(Message::Batch)
            }
            Message::RestoredResults(None) => Task::none(),
            Message::ToggleDevPanel => {
                self.dev_panel = !self.dev_panel;
                self.backend_output = self.state.shell.backend_output();
                Task::none()
            }
            Message::RefreshBackendOutput => {
                self.backend_output = self.state.shell.backend_output();
                Task::none()
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let header = row![
            column![
                text("Brain Tumor Detection").size(32),
                text("Upload MRI/CT images to detect potential brain tumors").size(14),
            ]
            .width(Length::Fill),
            button(text(if self.dev_panel { "Hide developer panel" } else { "Developer panel" }))
                .style(button::text)
                .on_press(Message::ToggleDevPanel),
        ];

        let body = match self.tab {
            Tab::Batch => self.batch.view().map(Message::Batch),
            Tab::Single => self.single.view().map(Message::Single),
        };

        let mut content = column![
            container(header).style(bordered_box).padding(16),
            tab_bar(self.tab, Message::TabSelected),
            container(body).height(Length::Fill),
        ]
        .spacing(16)
        .padding(20);

        if self.dev_panel {
            content = content.push(self.dev_panel_view());
        }
        content.into()
    }

    fn dev_panel_view(&self) -> Element<'_, Message> {
        let raw = self
            .last_results
            .as_ref()
            .and_then(|r| serde_json::to_string_pretty(r).ok())
            .unwrap_or_else(|| "no results".to_string());
        let output = if self.backend_output.is_empty() {
            "no backend output".to_string()
        } else {
            self.backend_output.join("\n")
        };
        container(
            row![
                scrollable(column![text("Last results").size(14), text(raw).size(11)])
                    .width(Length::FillPortion(1)),
                scrollable(column![text("Backend output").size(14), text(output).size(11)])
                    .width(Length::FillPortion(1)),
            ]
            .spacing(16),
        )
        .style(bordered_box)
        .padding(10)
        .height(Length::Fixed(220.0))
        .into()
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.dev_panel {
            iced::time::every(Duration::from_secs(1)).map(|_| Message::RefreshBackendOutput)
        } else {
            Subscription::none()
        }
    }
}
