use std::{convert::Infallible, path::PathBuf};

use iced::{
    Alignment::Center,
    Element, Length, Task,
    widget::{button, column, container, image, row, text},
};

use crate::{
    core::detection::DetectionResult,
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::{annotated_preview, detection_list, error_alert, verdict},
    },
};

#[derive(Debug, Clone, Default)]
pub struct SingleScreen {
    path: Option<PathBuf>,
    result: Option<DetectionResult>,
    preview: Option<image::Handle>,
    loading: bool,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum SingleMessage {
    PickImage,
    ImagePicked(Option<PathBuf>),
    Detect,
    Detected(Result<(DetectionResult, Option<image::Handle>), String>),
}

impl Screen for SingleScreen {
    type Message = SingleMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let pick = button(text("Choose Image"))
            .on_press(ScreenMessage::ScreenMessage(SingleMessage::PickImage));
        let detect = button(text(if self.loading { "Processing..." } else { "Detect Tumor" }))
            .on_press_maybe(
                (self.path.is_some() && !self.loading)
                    .then_some(ScreenMessage::ScreenMessage(SingleMessage::Detect)),
            );

        let mut content = column![
            text("Brain Tumor Detection").size(24),
            row![pick, detect].spacing(20),
        ]
        .spacing(16)
        .align_x(Center);

        if let Some(path) = &self.path {
            content = content.push(text(path.display().to_string()).size(12));
        }
        if let Some(error) = &self.error {
            content = content.push(error_alert(error));
        }
        if let Some(preview) = &self.preview {
            content = content.push(image(preview.clone()).width(Length::Fixed(480.0)));
        }
        if let Some(result) = &self.result {
            content = content.push(text("Analysis Results:").size(18));
            content = content.push(verdict(result));
            if result.has_tumor {
                content = content.push(detection_list(result));
            }
        }

        container(content)
            .padding(20)
            .center_x(Length::Fill)
            .into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            SingleMessage::PickImage => Task::perform(
                state.run(|shell| async move { Ok(shell.select_file().await) }),
                |picked: Result<Option<PathBuf>, String>| {
                    ScreenMessage::ScreenMessage(SingleMessage::ImagePicked(picked.ok().flatten()))
                },
            ),
            SingleMessage::ImagePicked(Some(path)) => {
                self.path = Some(path);
                self.result = None;
                self.preview = None;
                self.error = None;
                Task::none()
            }
            SingleMessage::ImagePicked(None) => Task::none(),
            SingleMessage::Detect => {
                let Some(path) = self.path.clone() else {
                    self.error = Some("Please choose an image".to_string());
                    return Task::none();
                };
                self.loading = true;
                self.error = None;
                Task::perform(
                    state.run(move |shell| async move {
                        let result = shell.detect(&path).await.map_err(|e| e.user_message())?;
                        let preview = tokio::task::spawn_blocking({
                            let result = result.clone();
                            move || annotated_preview(&path, &result)
                        })
                        .await
                        .ok()
                        .flatten();
                        Ok((result, preview))
                    }),
                    |outcome| ScreenMessage::ScreenMessage(SingleMessage::Detected(outcome)),
                )
            }
            SingleMessage::Detected(Ok((result, preview))) => {
                self.loading = false;
                self.result = Some(result);
                self.preview = preview;
                Task::none()
            }
            SingleMessage::Detected(Err(error)) => {
                self.loading = false;
                self.result = None;
                self.error = Some(error);
                Task::none()
            }
        }
    }
}
