// SPDX-License-Identifier: MIT
//
// The 16-color conio palette.
//
// Colors are the classic DOS text-mode numbers (0 = black … 15 = white),
// optionally OR-ed with the underline (64) or blink (128) bits. DOS orders
// the low three bits blue-green-red while ANSI orders them red-green-blue,
// so every color goes through a lookup table on the way out. Codes 9 and
// up are the "bright" half: same ANSI hue, plus SGR 1.
//
// Two codes have no exact ANSI twin. Dark gray (8) maps to SGR 0, the
// terminal's default color. Brown (6) is yellow without the bright bit.

use bitflags::bitflags;

/// DOS color index → ANSI SGR foreground code.
const ANSI_TABLE: [u8; 16] = [30, 34, 32, 36, 31, 35, 33, 37, 0, 34, 32, 36, 31, 35, 33, 37];

/// First color code rendered with the bright attribute.
pub const BRIGHT_MIN: u8 = 9;

/// SGR code emitted for underlined text.
pub const UNDERLINE_ATTR: u8 = 4;
/// SGR code emitted for blinking text.
pub const BLINK_ATTR: u8 = 5;
/// SGR code emitted for bright colors.
pub const BRIGHT_ATTR: u8 = 1;

/// Offset from a foreground SGR code to its background twin.
const BACKGROUND_OFFSET: u8 = 10;

bitflags! {
    /// Attribute bits that can be OR-ed onto a color code.
    ///
    /// ```
    /// use stp_term::{Color, Style};
    ///
    /// let c = Color::RED.with(Style::UNDERLINE);
    /// assert_eq!(c.code(), 4 | 64);
    /// assert!(c.style().contains(Style::UNDERLINE));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Style: u8 {
        const UNDERLINE = 64;
        const BLINK     = 128;
    }
}

/// A conio color code: palette index plus optional [`Style`] bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(u8);

impl Color {
    /// Black (SGR 30).
    pub const BLACK: Self = Self(0);
    /// Dark blue (SGR 34).
    pub const BLUE: Self = Self(1);
    /// Dark green (SGR 32).
    pub const GREEN: Self = Self(2);
    /// Dark cyan (SGR 36).
    pub const CYAN: Self = Self(3);
    /// Dark red (SGR 31).
    pub const RED: Self = Self(4);
    /// Dark magenta (SGR 35).
    pub const MAGENTA: Self = Self(5);
    /// Brown: yellow without the bright attribute (SGR 33).
    pub const BROWN: Self = Self(6);
    /// Light gray, the usual default foreground (SGR 37).
    pub const LIGHT_GRAY: Self = Self(7);
    /// Dark gray. No ANSI twin; renders as the terminal default (SGR 0).
    pub const DARK_GRAY: Self = Self(8);
    /// Bright blue (SGR 1;34).
    pub const LIGHT_BLUE: Self = Self(9);
    /// Bright green (SGR 1;32).
    pub const LIGHT_GREEN: Self = Self(10);
    /// Bright cyan (SGR 1;36).
    pub const LIGHT_CYAN: Self = Self(11);
    /// Bright red (SGR 1;31).
    pub const LIGHT_RED: Self = Self(12);
    /// Bright magenta (SGR 1;35).
    pub const LIGHT_MAGENTA: Self = Self(13);
    /// Yellow: bright brown (SGR 1;33).
    pub const YELLOW: Self = Self(14);
    /// White: bright light gray (SGR 1;37).
    pub const WHITE: Self = Self(15);

    /// Wrap a raw code, style bits included.
    #[must_use]
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    /// The raw code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Palette index, 0–15.
    #[must_use]
    pub const fn index(self) -> u8 {
        self.0 & 15
    }

    /// Style bits carried by this code.
    #[must_use]
    pub const fn style(self) -> Style {
        Style::from_bits_truncate(self.0)
    }

    /// The same color with extra style bits.
    #[must_use]
    pub const fn with(self, style: Style) -> Self {
        Self(self.0 | style.bits())
    }

    /// Whether the raw code is in the bright range.
    ///
    /// Compares the whole code, style bits included, so a styled color
    /// never counts as a plain dark one.
    #[must_use]
    pub const fn is_bright(self) -> bool {
        self.0 >= BRIGHT_MIN
    }

    /// SGR foreground code for the hue.
    #[must_use]
    pub const fn ansi_code(self) -> u8 {
        ANSI_TABLE[self.index() as usize]
    }

    /// SGR attribute that goes with this color as a foreground.
    ///
    /// Underline wins over blink, blink over bright; plain dark colors get
    /// SGR 0.
    #[must_use]
    pub const fn attribute(self) -> u8 {
        if self.0 & Style::UNDERLINE.bits() != 0 {
            UNDERLINE_ATTR
        } else if self.0 & Style::BLINK.bits() != 0 {
            BLINK_ATTR
        } else if self.is_bright() {
            BRIGHT_ATTR
        } else {
            0
        }
    }

    /// SGR background code, or `None` for colors that can't be backgrounds.
    #[must_use]
    pub const fn background_code(self) -> Option<u8> {
        if self.is_bright() {
            None
        } else {
            Some(self.ansi_code() + BACKGROUND_OFFSET)
        }
    }
}

impl From<u8> for Color {
    fn from(code: u8) -> Self {
        Self(code)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dos_order_maps_to_ansi_order() {
        assert_eq!(Color::BLACK.ansi_code(), 30);
        assert_eq!(Color::BLUE.ansi_code(), 34);
        assert_eq!(Color::GREEN.ansi_code(), 32);
        assert_eq!(Color::RED.ansi_code(), 31);
        assert_eq!(Color::BROWN.ansi_code(), 33);
        assert_eq!(Color::LIGHT_GRAY.ansi_code(), 37);
    }

    #[test]
    fn dark_gray_is_terminal_default() {
        assert_eq!(Color::DARK_GRAY.ansi_code(), 0);
        assert_eq!(Color::DARK_GRAY.attribute(), 0);
    }

    #[test]
    fn bright_half_shares_hue_with_dark_half() {
        for i in 1..8u8 {
            assert_eq!(Color::new(i).ansi_code(), Color::new(i + 8).ansi_code());
        }
    }

    #[test]
    fn bright_starts_at_nine() {
        assert_eq!(Color::new(BRIGHT_MIN - 1).attribute(), 0);
        assert_eq!(Color::LIGHT_BLUE.attribute(), BRIGHT_ATTR);
        assert_eq!(Color::WHITE.attribute(), BRIGHT_ATTR);
        assert_eq!(Color::BLUE.attribute(), 0);
    }

    #[test]
    fn underline_beats_blink_beats_bright() {
        let both = Color::YELLOW.with(Style::UNDERLINE | Style::BLINK);
        assert_eq!(both.attribute(), UNDERLINE_ATTR);
        assert_eq!(Color::YELLOW.with(Style::BLINK).attribute(), BLINK_ATTR);
        assert_eq!(Color::RED.with(Style::UNDERLINE).ansi_code(), 31);
    }

    #[test]
    fn backgrounds_only_for_dark_colors() {
        assert_eq!(Color::GREEN.background_code(), Some(42));
        assert_eq!(Color::BLUE.background_code(), Some(44));
        assert_eq!(Color::LIGHT_GRAY.background_code(), Some(47));
        assert_eq!(Color::LIGHT_BLUE.background_code(), None);
        assert_eq!(Color::GREEN.with(Style::BLINK).background_code(), None);
    }

    #[test]
    fn style_roundtrip_through_code() {
        let c = Color::CYAN.with(Style::BLINK);
        assert_eq!(c.index(), 3);
        assert_eq!(c.style(), Style::BLINK);
        assert_eq!(Color::from(c.code()), c);
    }
}
