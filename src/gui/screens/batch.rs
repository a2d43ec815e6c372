use std::{collections::HashMap, path::PathBuf};

use iced::{
    Element, Length, Task,
    widget::{Column, button, column, container, image, row, scrollable, text},
};

use crate::{
    core::detection::{BatchResult, FileOutcome},
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::{annotated_preview, error_alert, result_card},
    },
};

#[derive(Debug, Clone, Default)]
pub struct BatchScreen {
    selected: Vec<PathBuf>,
    results: BatchResult,
    previews: HashMap<PathBuf, image::Handle>,
    loading: bool,
    error: Option<String>,
    notice: Option<String>,
}

#[derive(Debug, Clone)]
pub enum BatchMessage {
    SelectFiles,
    FilesSelected(Vec<PathBuf>),
    Detect,
    Detected(Result<BatchResult, String>),
    PreviewsReady(Vec<(PathBuf, image::Handle)>),
    Save,
    Saved(Result<Option<PathBuf>, String>),
}

#[derive(Debug, Clone)]
pub enum BatchParentMessage {
    ResultsChanged(BatchResult),
}

impl BatchScreen {
    /// Shows a previously saved batch.
    pub fn restore(&mut self, results: BatchResult, state: &AppState) -> Task<ScreenMessage<Self>> {
        self.selected = results.entries.iter().map(|e| e.path.clone()).collect();
        self.previews.clear();
        let task = Self::render_previews(&results, state);
        self.results = results;
        task
    }

    pub fn results(&self) -> &BatchResult {
        &self.results
    }

    fn render_previews(results: &BatchResult, state: &AppState) -> Task<ScreenMessage<Self>> {
        let jobs: Vec<_> = results
            .entries
            .iter()
            .filter_map(|entry| match &entry.outcome {
                FileOutcome::Detected(result) => Some((entry.path.clone(), result.clone())),
                FileOutcome::Failed { .. } => None,
            })
            .collect();
        if jobs.is_empty() {
            return Task::none();
        }
        Task::perform(
            state.spawn_blocking(move || {
                jobs.into_iter()
                    .filter_map(|(path, result)| {
                        annotated_preview(&path, &result).map(|h| (path, h))
                    })
                    .collect::<Vec<_>>()
            }),
            |previews| {
                ScreenMessage::ScreenMessage(BatchMessage::PreviewsReady(
                    previews.unwrap_or_default(),
                ))
            },
        )
    }
}

impl Screen for BatchScreen {
    type Message = BatchMessage;
    type ParentMessage = BatchParentMessage;

    fn view<'a>(&'a self) -> Element<'a, ScreenMessage<Self>> {
        let select = button(text("Select MRI/CT Images"))
            .width(Length::Fill)
            .on_press(ScreenMessage::ScreenMessage(BatchMessage::SelectFiles));

        let mut upload = column![text("Upload Images").size(20), select].spacing(12);
        if !self.selected.is_empty() {
            upload = upload.push(text(format!("Files selected: {}", self.selected.len())));
            upload = upload.push(Column::with_children(self.selected.iter().map(
                |path| -> Element<'a, ScreenMessage<Self>> {
                    text(path.display().to_string()).size(12).into()
                },
            )));
        }

        let detect_label = if self.loading { "Detecting..." } else { "Detect Tumors" };
        let can_detect = !self.selected.is_empty() && !self.loading;
        upload = upload.push(
            button(text(detect_label))
                .width(Length::Fill)
                .on_press_maybe(
                    can_detect.then_some(ScreenMessage::ScreenMessage(BatchMessage::Detect)),
                ),
        );
        if let Some(error) = &self.error {
            upload = upload.push(error_alert(error));
        }

        let mut results = column![text("Detection Results").size(20)].spacing(12);
        if self.results.is_empty() {
            results = results.push(
                text("No results yet. Upload images and run detection to see results.")
                    .width(Length::Fill),
            );
        } else {
            results = results.push(
                button(text("Save Results"))
                    .style(button::secondary)
                    .on_press(ScreenMessage::ScreenMessage(BatchMessage::Save)),
            );
            if let Some(notice) = &self.notice {
                results = results.push(text(notice.clone()).size(12));
            }
            for entry in &self.results.entries {
                results = results.push(result_card(
                    &entry.path,
                    &entry.outcome,
                    self.previews.get(&entry.path),
                ));
            }
        }

        row![
            container(scrollable(upload)).padding(10).width(Length::FillPortion(1)),
            container(scrollable(results)).padding(10).width(Length::FillPortion(1)),
        ]
        .spacing(20)
        .into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            BatchMessage::SelectFiles => Task::perform(
                state.run(|shell| async move { Ok(shell.select_files().await) }),
                |files: Result<Vec<PathBuf>, String>| {
                    ScreenMessage::ScreenMessage(BatchMessage::FilesSelected(
                        files.unwrap_or_default(),
                    ))
                },
            ),
            BatchMessage::FilesSelected(files) => {
                // cancelled dialog keeps the previous selection
                if !files.is_empty() {
                    self.selected = files;
                    self.error = None;
                }
                Task::none()
            }
            BatchMessage::Detect => {
                if self.selected.is_empty() {
                    self.error = Some("No files selected".to_string());
                    return Task::none();
                }
                self.loading = true;
                self.error = None;
                self.notice = None;
                let paths = self.selected.clone();
                Task::perform(
                    state.run(move |shell| async move {
                        shell.detect_batch(&paths).await.map_err(|e| e.user_message())
                    }),
                    |result| ScreenMessage::ScreenMessage(BatchMessage::Detected(result)),
                )
            }
            BatchMessage::Detected(Ok(results)) => {
                self.loading = false;
                let failures: Vec<_> = results
                    .failures()
                    .map(|(path, error)| format!("{}: {error}", path.display()))
                    .collect();
                if !failures.is_empty() {
                    self.error = Some(format!("Error during detection: {}", failures.join("; ")));
                }
                self.results = results.clone();
                self.previews.clear();
                Task::batch([
                    Self::render_previews(&results, state),
                    Task::done(ScreenMessage::ParentMessage(
                        BatchParentMessage::ResultsChanged(results),
                    )),
                ])
            }
            BatchMessage::Detected(Err(error)) => {
                self.loading = false;
                self.error = Some(error);
                Task::none()
            }
            BatchMessage::PreviewsReady(previews) => {
                self.previews.extend(previews);
                Task::none()
            }
            BatchMessage::Save => {
                let results = self.results.clone();
                Task::perform(
                    state.run(move |shell| async move {
                        shell.save_results(&results).await.map_err(|e| format!("{e:#}"))
                    }),
                    |saved| ScreenMessage::ScreenMessage(BatchMessage::Saved(saved)),
                )
            }
            BatchMessage::Saved(Ok(Some(path))) => {
                self.notice = Some(format!("Saved to {}", path.display()));
                Task::none()
            }
            BatchMessage::Saved(Ok(None)) => Task::none(),
            BatchMessage::Saved(Err(error)) => {
                self.error = Some(format!("Error saving results: {error}"));
                Task::none()
            }
        }
    }
}
