//! Graphics rendition (SGR) state.
//!
//! Holds the text attributes selected by CSI `m` and converts between the
//! attribute record and its parameter-list form in both directions.

use super::params::Params;

/// Font weight selected by SGR 1/2.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FontWeight {
    #[default]
    None,
    Bold,
    Dim,
}

/// Underline style selected by SGR 4 / 4:x / 21.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnderlineMode {
    #[default]
    None,
    Normal,
    Double,
    Curly,
    Dotted,
    Dashed,
}

/// Blink rate selected by SGR 5/6.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlinkMode {
    #[default]
    None,
    Normal,
    Rapid,
}

/// A color slot: terminal default, one of the 16 palette entries, or a
/// direct RGB value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

/// The full set of attributes applied to newly written cells.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphicsRendition {
    pub font_weight: FontWeight,
    pub italic: bool,
    pub underline_mode: UnderlineMode,
    pub blink_mode: BlinkMode,
    pub inverted: bool,
    pub invisible: bool,
    pub strike_through: bool,
    pub overline: bool,
    pub fg: Color,
    pub bg: Color,
    pub underline_color: Color,
}

impl GraphicsRendition {
    /// Apply a CSI `m` parameter list to this rendition.
    ///
    /// An empty list acts like a single 0 (reset). Extended colors accept
    /// both the semicolon form (`38;2;r;g;b`, consuming four extra groups)
    /// and the colon form (`38:2:r:g:b`, one group); a short extended color
    /// is ignored and parsing resumes at the next group.
    pub fn update_with_csi_params(&mut self, params: &Params) {
        let mut i = 0;
        while i == 0 || i < params.size() {
            match params.get(i) {
                0 => *self = Self::default(),
                1 => self.font_weight = FontWeight::Bold,
                2 => self.font_weight = FontWeight::Dim,
                3 => self.italic = true,
                4 => {
                    self.underline_mode = match params.subparams(i).get(1) {
                        Some(0) => UnderlineMode::None,
                        Some(2) => UnderlineMode::Double,
                        Some(3) => UnderlineMode::Curly,
                        Some(4) => UnderlineMode::Dotted,
                        Some(5) => UnderlineMode::Dashed,
                        _ => UnderlineMode::Normal,
                    };
                }
                5 => self.blink_mode = BlinkMode::Normal,
                6 => self.blink_mode = BlinkMode::Rapid,
                7 => self.inverted = true,
                8 => self.invisible = true,
                9 => self.strike_through = true,
                21 => self.underline_mode = UnderlineMode::Double,
                22 => self.font_weight = FontWeight::None,
                23 => self.italic = false,
                24 => self.underline_mode = UnderlineMode::None,
                25 => self.blink_mode = BlinkMode::None,
                27 => self.inverted = false,
                28 => self.invisible = false,
                29 => self.strike_through = false,
                30..=37 => self.fg = Color::Indexed((params.get(i) - 30) as u8),
                38 => {
                    if let Some((color, consumed)) = Self::extended_color(params, i) {
                        self.fg = color;
                        i += consumed;
                    }
                }
                39 => self.fg = Color::Default,
                40..=47 => self.bg = Color::Indexed((params.get(i) - 40) as u8),
                48 => {
                    if let Some((color, consumed)) = Self::extended_color(params, i) {
                        self.bg = color;
                        i += consumed;
                    }
                }
                49 => self.bg = Color::Default,
                53 => self.overline = true,
                55 => self.overline = false,
                58 => {
                    if let Some((color, consumed)) = Self::extended_color(params, i) {
                        self.underline_color = color;
                        i += consumed;
                    }
                }
                59 => self.underline_color = Color::Default,
                90..=97 => self.fg = Color::Indexed((params.get(i) - 90 + 8) as u8),
                100..=107 => self.bg = Color::Indexed((params.get(i) - 100 + 8) as u8),
                _ => {}
            }
            i += 1;
        }
    }

    /// Decode the color following a 38/48/58 introducer at group `i`.
    /// Returns the color and the number of extra groups consumed.
    fn extended_color(params: &Params, i: usize) -> Option<(Color, usize)> {
        let sub = params.subparams(i);
        if sub.len() >= 5 && sub[1] == 2 {
            return Some((
                Color::Rgb(
                    sub[2].min(255) as u8,
                    sub[3].min(255) as u8,
                    sub[4].min(255) as u8,
                ),
                0,
            ));
        }
        if sub.len() >= 3 && sub[1] == 8 {
            return Some((Color::Indexed(sub[2].min(15) as u8), 0));
        }
        if params.get(i + 1) == 2 && params.size() - i >= 5 {
            return Some((
                Color::Rgb(
                    params.get(i + 2).min(255) as u8,
                    params.get(i + 3).min(255) as u8,
                    params.get(i + 4).min(255) as u8,
                ),
                4,
            ));
        }
        None
    }

    /// Render this rendition as a canonical parameter list, beginning with a
    /// reset so the result is position-independent.
    pub fn as_csi_params(&self) -> Params {
        let mut sgr = Params::new();
        sgr.add_param(0);

        match self.font_weight {
            FontWeight::Bold => sgr.add_param(1),
            FontWeight::Dim => sgr.add_param(2),
            FontWeight::None => {}
        }
        if self.italic {
            sgr.add_param(3);
        }
        match self.underline_mode {
            UnderlineMode::Normal => sgr.add_param(4),
            UnderlineMode::Double => sgr.add_param(21),
            UnderlineMode::Curly => sgr.add_subparams(vec![4, 3]),
            UnderlineMode::Dotted => sgr.add_subparams(vec![4, 4]),
            UnderlineMode::Dashed => sgr.add_subparams(vec![4, 5]),
            UnderlineMode::None => {}
        }
        match self.blink_mode {
            BlinkMode::Normal => sgr.add_param(5),
            BlinkMode::Rapid => sgr.add_param(6),
            BlinkMode::None => {}
        }
        if self.inverted {
            sgr.add_param(7);
        }
        if self.invisible {
            sgr.add_param(8);
        }
        if self.strike_through {
            sgr.add_param(9);
        }
        if self.overline {
            sgr.add_param(53);
        }
        if let Some(group) = color_subparams(self.fg, ColorSlot::Fg) {
            sgr.add_subparams(group);
        }
        if let Some(group) = color_subparams(self.bg, ColorSlot::Bg) {
            sgr.add_subparams(group);
        }
        if let Some(group) = color_subparams(self.underline_color, ColorSlot::Underline) {
            sgr.add_subparams(group);
        }
        sgr
    }
}

enum ColorSlot {
    Fg,
    Bg,
    Underline,
}

fn color_subparams(color: Color, slot: ColorSlot) -> Option<Vec<u32>> {
    match color {
        Color::Default => None,
        Color::Rgb(r, g, b) => {
            let code = match slot {
                ColorSlot::Fg => 38,
                ColorSlot::Bg => 48,
                ColorSlot::Underline => 58,
            };
            Some(vec![code, 2, u32::from(r), u32::from(g), u32::from(b)])
        }
        Color::Indexed(index) => match slot {
            // There is no short form for underline colors.
            ColorSlot::Underline => Some(vec![58, 8, u32::from(index)]),
            ColorSlot::Fg if index < 8 => Some(vec![30 + u32::from(index)]),
            ColorSlot::Fg => Some(vec![90 + u32::from(index) - 8]),
            ColorSlot::Bg if index < 8 => Some(vec![40 + u32::from(index)]),
            ColorSlot::Bg => Some(vec![100 + u32::from(index) - 8]),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(params: &Params) -> GraphicsRendition {
        let mut sgr = GraphicsRendition::default();
        sgr.update_with_csi_params(params);
        sgr
    }

    #[test]
    fn test_basic_attributes() {
        let sgr = parse(&Params::from_slice(&[1, 3, 4, 7, 31]));
        assert_eq!(sgr.font_weight, FontWeight::Bold);
        assert!(sgr.italic);
        assert_eq!(sgr.underline_mode, UnderlineMode::Normal);
        assert!(sgr.inverted);
        assert_eq!(sgr.fg, Color::Indexed(1));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut sgr = parse(&Params::from_slice(&[1, 9, 44]));
        sgr.update_with_csi_params(&Params::from_slice(&[0]));
        assert_eq!(sgr, GraphicsRendition::default());

        // An empty parameter list behaves like a reset.
        let mut sgr = parse(&Params::from_slice(&[1]));
        sgr.update_with_csi_params(&Params::new());
        assert_eq!(sgr, GraphicsRendition::default());
    }

    #[test]
    fn test_truecolor_semicolon_form() {
        let sgr = parse(&Params::from_slice(&[38, 2, 10, 20, 30, 48, 2, 1, 2, 3]));
        assert_eq!(sgr.fg, Color::Rgb(10, 20, 30));
        assert_eq!(sgr.bg, Color::Rgb(1, 2, 3));
    }

    #[test]
    fn test_truecolor_colon_form() {
        let mut params = Params::new();
        params.add_subparams(vec![38, 2, 255, 128, 0]);
        params.add_param(4);
        let sgr = parse(&params);
        assert_eq!(sgr.fg, Color::Rgb(255, 128, 0));
        // The group after a colon-form color is still processed.
        assert_eq!(sgr.underline_mode, UnderlineMode::Normal);
    }

    #[test]
    fn test_short_extended_color_ignored() {
        let sgr = parse(&Params::from_slice(&[38, 2, 10, 31]));
        // Not enough parameters for an RGB color: 38 is skipped, but the
        // following groups are consumed as ordinary codes.
        assert_eq!(sgr.fg, Color::Indexed(1));
    }

    #[test]
    fn test_underline_subparam_styles() {
        let mut params = Params::new();
        params.add_subparams(vec![4, 3]);
        assert_eq!(parse(&params).underline_mode, UnderlineMode::Curly);

        let mut params = Params::new();
        params.add_subparams(vec![4, 5]);
        assert_eq!(parse(&params).underline_mode, UnderlineMode::Dashed);
    }

    #[test]
    fn test_overline_on_off() {
        let mut sgr = parse(&Params::from_slice(&[53]));
        assert!(sgr.overline);
        sgr.update_with_csi_params(&Params::from_slice(&[55]));
        assert!(!sgr.overline);
    }

    #[test]
    fn test_bright_palette() {
        let sgr = parse(&Params::from_slice(&[97, 100]));
        assert_eq!(sgr.fg, Color::Indexed(15));
        assert_eq!(sgr.bg, Color::Indexed(8));
    }

    #[test]
    fn test_round_trip() {
        let samples = [
            GraphicsRendition::default(),
            GraphicsRendition {
                font_weight: FontWeight::Bold,
                italic: true,
                fg: Color::Indexed(3),
                bg: Color::Indexed(12),
                ..Default::default()
            },
            GraphicsRendition {
                underline_mode: UnderlineMode::Curly,
                underline_color: Color::Rgb(1, 2, 3),
                blink_mode: BlinkMode::Rapid,
                overline: true,
                ..Default::default()
            },
            GraphicsRendition {
                font_weight: FontWeight::Dim,
                invisible: true,
                strike_through: true,
                inverted: true,
                fg: Color::Rgb(200, 100, 50),
                ..Default::default()
            },
        ];
        for sgr in samples {
            assert_eq!(parse(&sgr.as_csi_params()), sgr);
        }
    }
}
