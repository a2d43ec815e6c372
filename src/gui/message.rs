use crate::{
    core::detection::BatchResult,
    gui::screens::{ScreenMessage, Tab, batch::BatchScreen, single::SingleScreen},
};

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    Batch(ScreenMessage<BatchScreen>),
    Single(ScreenMessage<SingleScreen>),
    RestoredResults(Option<BatchResult>),
    ToggleDevPanel,
    RefreshBackendOutput,
}
