use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::system_monitor::{Command, PanelId, SortKey, ViewMode};

/// Translate a key press into a session command; unbound keys yield `None`.
pub fn command_for_key(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    // Raw mode swallows SIGINT, so Ctrl+C arrives as a key
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Command::Quit),
            _ => None,
        };
    }

    let command = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Command::Quit,
        KeyCode::Char('?') | KeyCode::Char('h') => Command::ToggleHelp,
        KeyCode::Char('1') => Command::SwitchView(ViewMode::Main),
        KeyCode::Char('2') => Command::SwitchView(ViewMode::Containers),
        KeyCode::Char('3') => Command::SwitchView(ViewMode::Alerts),
        KeyCode::Char('c') => Command::SortBy(SortKey::Cpu),
        KeyCode::Char('m') => Command::SortBy(SortKey::Memory),
        KeyCode::Char('p') => Command::SortBy(SortKey::Pid),
        KeyCode::Char('n') => Command::SortBy(SortKey::Name),
        KeyCode::Char('S') => Command::TogglePanel(PanelId::System),
        KeyCode::Char('C') => Command::TogglePanel(PanelId::Cpu),
        KeyCode::Char('M') => Command::TogglePanel(PanelId::Memory),
        KeyCode::Char('D') => Command::TogglePanel(PanelId::Disk),
        KeyCode::Char('N') => Command::TogglePanel(PanelId::Network),
        KeyCode::Char('G') => Command::TogglePanel(PanelId::Gpu),
        KeyCode::Char('B') => Command::TogglePanel(PanelId::Battery),
        KeyCode::Char('+') | KeyCode::Char('=') => Command::IncreaseInterval,
        KeyCode::Char('-') => Command::DecreaseInterval,
        _ => return None,
    };
    Some(command)
}
