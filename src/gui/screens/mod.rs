pub mod batch;
pub mod single;

use iced::{Element, Task};

use crate::gui::AppState;

#[derive(Debug, Clone)]
pub enum ScreenMessage<S: Screen> {
    ScreenMessage(S::Message),
    ParentMessage(S::ParentMessage),
}

pub trait Screen: Sized {
    type Message: std::fmt::Debug + Clone + Send;
    type ParentMessage: std::fmt::Debug + Clone + Send;
    fn view(&self) -> Element<'_, ScreenMessage<Self>>;
    fn update(&mut self, message: Self::Message, state: &mut AppState)
    -> Task<ScreenMessage<Self>>;
}

/// Tabs of the main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Batch,
    Single,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Batch, Tab::Single];

    pub fn label(self) -> &'static str {
        match self {
            Tab::Batch => "Batch Processing",
            Tab::Single => "Single Image",
        }
    }
}
