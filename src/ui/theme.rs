//! Theme Colors for Ratatui
//! Usage:
//!   use ratatui::style::Color;
//!   let theme = Theme::dark();
//!   let primary_color = theme.primary;

use ratatui::style::Color;

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub primary: Color,
    pub accent: Color,
    pub warning: Color,
    pub error: Color,
    pub success: Color,
    pub foreground: Color,
    pub background: Color,
    pub surface: Color,
}

impl Theme {
    pub const fn dark() -> Self {
        Self {
            primary: Color::from_u32(0x00ffff),
            accent: Color::from_u32(0xffaa22),
            warning: Color::from_u32(0x226666),
            error: Color::from_u32(0xff0000),
            success: Color::from_u32(0x00ff00),
            foreground: Color::from_u32(0xeeeeee),
            background: Color::from_u32(0x111111),
            surface: Color::from_u32(0x222222),
        }
    }
}
