mod cli;
mod tui;

pub(crate) use cli::{as_cli, handle_info};
pub(crate) use tui::as_tui;
