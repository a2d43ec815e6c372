mod app;
mod message;
mod screens;
mod state;
mod widgets;

pub use app::TumorscanApp;
pub use message::Message;
pub use state::{AppShell, AppState};
