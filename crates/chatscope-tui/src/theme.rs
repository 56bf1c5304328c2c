// Terminal colors for the chrome around the scatter canvas.
// Point colors come from the core color assignment, not from here.

use chatscope_core::color::{Rgb, Theme};
use ratatui::style::{Color, Modifier, Style};

pub const BG_DARK: Color = Color::Rgb(0, 0, 0);
pub const BG_LIGHT: Color = Color::Rgb(245, 245, 245);

pub const TEXT_PRIMARY: Color = Color::Rgb(220, 220, 220);
pub const TEXT_MUTED: Color = Color::Rgb(128, 128, 128);
pub const TEXT_DIM: Color = Color::Rgb(90, 90, 90);

pub const ACCENT_PRIMARY: Color = Color::Rgb(86, 156, 214);
pub const ACCENT_SUCCESS: Color = Color::Rgb(106, 153, 85);
pub const ACCENT_WARNING: Color = Color::Rgb(206, 145, 60);
pub const ACCENT_ERROR: Color = Color::Rgb(244, 71, 71);

/// Drawn over selected points
pub const SELECTION: Color = Color::Rgb(255, 255, 255);
/// Lasso path while dragging
pub const LASSO: Color = Color::Rgb(255, 214, 10);

pub fn background(theme: Theme) -> Color {
    match theme {
        Theme::Dark => BG_DARK,
        Theme::Light => BG_LIGHT,
    }
}

pub fn background_rgb(theme: Theme) -> Rgb {
    match theme {
        Theme::Dark => Rgb::new(0, 0, 0),
        Theme::Light => Rgb::new(245, 245, 245),
    }
}

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

/// Terminals have no alpha; fade toward the background instead.
pub fn blend(color: Rgb, background: Rgb, opacity: f32) -> Rgb {
    let a = opacity.clamp(0.0, 1.0);
    let mix = |fg: u8, bg: u8| (fg as f32 * a + bg as f32 * (1.0 - a)).round() as u8;
    Rgb::new(mix(color.r, background.r), mix(color.g, background.g), mix(color.b, background.b))
}

pub fn title() -> Style {
    Style::default().fg(ACCENT_PRIMARY).add_modifier(Modifier::BOLD)
}

pub fn muted() -> Style {
    Style::default().fg(TEXT_MUTED)
}

pub fn hint() -> Style {
    Style::default().fg(TEXT_DIM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_endpoints() {
        let red = Rgb::new(255, 0, 0);
        let black = Rgb::new(0, 0, 0);
        assert_eq!(blend(red, black, 1.0), red);
        assert_eq!(blend(red, black, 0.0), black);
        assert_eq!(blend(red, black, 0.5), Rgb::new(128, 0, 0));
    }
}
