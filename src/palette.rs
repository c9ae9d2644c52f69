use crate::models::ColorChoice;

const fn color(name: &'static str, value: &'static str, hex: &'static str) -> ColorChoice {
    ColorChoice { name, value, hex }
}

pub const VARIATION_COLORS: [ColorChoice; 17] = [
    color("Black", "BLACK", "#000000"),
    color("White", "WHITE", "#FFFFFF"),
    color("Sport Grey", "SPORT GREY", "#a9a9a9"),
    color("Sand", "SAND", "#d8c6b1"),
    color("Forest Green", "FOREST GREEN", "#228B22"),
    color("Light Pink", "LIGHT PINK", "#FFB6C1"),
    color("Navy", "NAVY", "#000080"),
    color("Military Green", "MILITARY GREEN", "#4b5320"),
    color("Maroon", "MAROON", "#800000"),
    color("Red", "RED", "#FF0000"),
    color("Royal Blue", "ROYAL BLUE", "#4169E1"),
    color("Ash Grey", "ASH GREY", "#B2BEB5"),
    color("Light Blue", "LIGHT BLUE", "#ADD8E6"),
    color("Charcoal", "CHARCOAL", "#36454F"),
    color("Dark Heather", "DARK HEATHER", "#555555"),
    color("Purple", "PURPLE", "#800080"),
    color("Orange", "ORANGE", "#FFA500"),
];

pub fn palette() -> &'static [ColorChoice] {
    &VARIATION_COLORS
}

/// Resolves a canonical value, ignoring case and surrounding whitespace.
pub fn find_color(value: &str) -> Option<ColorChoice> {
    let wanted = value.trim();
    VARIATION_COLORS.iter().copied().find(|c| c.value.eq_ignore_ascii_case(wanted))
}
