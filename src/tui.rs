use ratatui::DefaultTerminal;
use std::io;

pub type Tui = DefaultTerminal;

/// Enters raw mode and the alternate screen.
pub fn init() -> io::Result<Tui> {
    ratatui::try_init()
}

pub fn restore() -> io::Result<()> {
    ratatui::try_restore()
}
