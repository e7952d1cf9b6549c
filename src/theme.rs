use anstyle::{AnsiColor, Color, Effects, Reset, RgbColor, Style};
use clap::builder::Styles;
use log::Level;

pub const ACCENT_RGB: (u8, u8, u8) = (207, 106, 76);

const ACCENT: Style = Style::new().fg_color(Some(Color::Rgb(RgbColor(
    ACCENT_RGB.0,
    ACCENT_RGB.1,
    ACCENT_RGB.2,
))));
const DIM: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack)));

/// Help output styles for the generated command tree.
#[must_use]
pub fn styles() -> Styles {
    Styles::styled()
        .header(ACCENT.effects(Effects::BOLD))
        .usage(ACCENT.effects(Effects::BOLD))
        .literal(Style::new().effects(Effects::BOLD))
        .placeholder(DIM)
}

#[must_use]
pub fn title(text: &str) -> String {
    let bold = ACCENT.effects(Effects::BOLD);
    format!("{bold}{text}{Reset}")
}

#[must_use]
pub fn level_style(level: Level) -> Style {
    let color = match level {
        Level::Error => AnsiColor::Red,
        Level::Warn => AnsiColor::Yellow,
        Level::Info => AnsiColor::Blue,
        Level::Debug | Level::Trace => AnsiColor::BrightBlack,
    };
    Style::new().fg_color(Some(Color::Ansi(color)))
}
