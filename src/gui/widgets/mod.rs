use std::path::Path;

use iced::{
    Color, Element, Length, Theme, border,
    widget::{Column, button, column, container, container::Style, image, row, text},
};
use iced_widget::container::bordered_box;
use tracing::warn;

use crate::{
    core::detection::{DetectionResult, FileOutcome},
    gui::screens::Tab,
    overlay,
};

impl Tab {
    fn style(self, active: Self) -> impl Fn(&Theme) -> Style {
        move |theme: &Theme| {
            let width = if self == active { 3 } else { 1 };
            let style = bordered_box(theme).border(border::width(width));
            // darken the active tab
            if self == active {
                let mut color_rgba = theme.palette().background.into_rgba8();
                color_rgba[0] /= 2;
                color_rgba[1] /= 2;
                color_rgba[2] /= 2;
                style.background(Color::from_rgb8(color_rgba[0], color_rgba[1], color_rgba[2]))
            } else {
                style.background(theme.palette().background)
            }
        }
    }
}

pub fn tab_bar<'a, Message>(active: Tab, on_select: impl Fn(Tab) -> Message) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let tabs = Tab::ALL.into_iter().map(|tab| -> Element<'a, Message> {
        container(
            button(text(tab.label()))
                .style(button::text)
                .on_press(on_select(tab)),
        )
        .style(tab.style(active))
        .padding(4)
        .into()
    });
    container(row(tabs).spacing(10)).center_x(Length::Fill).into()
}

pub fn error_alert<'a, Message: 'a>(message: &str) -> Element<'a, Message> {
    container(text(message.to_string()).style(text::danger))
        .style(bordered_box)
        .padding(10)
        .width(Length::Fill)
        .into()
}

pub fn verdict<'a, Message: 'a>(result: &DetectionResult) -> Element<'a, Message> {
    let headline = if result.has_tumor {
        text("Tumor Detected").size(20).style(text::danger)
    } else {
        text("No Tumor Detected").size(20).style(text::success)
    };
    let mut details = column![
        headline,
        text(format!("Confidence: {:.2}%", result.confidence_percent())),
    ]
    .spacing(4);
    if !result.detections.is_empty() {
        details = details.push(text(format!("Tumors found: {}", result.detections.len())));
    }
    details.into()
}

/// Per-detection confidences, as listed in the single-image view.
pub fn detection_list<'a, Message: 'a>(result: &DetectionResult) -> Element<'a, Message> {
    let rows = result.detections.iter().enumerate().map(
        |(i, detection)| -> Element<'a, Message> {
            text(format!("Detection #{}: {:.2}%", i + 1, detection.confidence * 100.0)).into()
        },
    );
    Column::with_children(rows).spacing(2).into()
}

pub fn result_card<'a, Message: 'a>(
    path: &Path,
    outcome: &FileOutcome,
    preview: Option<&image::Handle>,
) -> Element<'a, Message> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut card = column![text(name).size(16)].spacing(8);
    if let Some(handle) = preview {
        card = card.push(image(handle.clone()).width(Length::Fill));
    }
    card = card.push(match outcome {
        FileOutcome::Detected(result) => verdict(result),
        FileOutcome::Failed { error } => text(format!("Detection failed: {error}"))
            .style(text::danger)
            .into(),
    });
    container(card).style(bordered_box).padding(10).width(Length::Fill).into()
}

/// Annotated preview for the image widget. `None` for formats the image
/// crate cannot decode (e.g. DICOM).
pub fn annotated_preview(path: &Path, result: &DetectionResult) -> Option<image::Handle> {
    match overlay::load_annotated(path, &result.detections) {
        Ok(img) => {
            let (width, height) = img.dimensions();
            Some(image::Handle::from_rgba(width, height, img.into_raw()))
        }
        Err(err) => {
            warn!(?path, error = %err, "no preview");
            None
        }
    }
}
