//! Theme palettes for rendered entry documents.
//!
//! `ThemeVariant` selects between the light and dark palettes; the
//! palette is a set of CSS color strings injected into the inline
//! stylesheet of every rendered document.

// ============================================================================
// Theme Variant
// ============================================================================

/// Available theme variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeVariant {
    #[default]
    Light,
    Dark,
}

impl ThemeVariant {
    /// Parse a variant name from a string (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    /// Build the `HtmlPalette` for this variant.
    pub fn palette(self) -> HtmlPalette {
        match self {
            Self::Light => HtmlPalette::LIGHT,
            Self::Dark => HtmlPalette::DARK,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Dark => "Dark",
        }
    }
}

// ============================================================================
// HTML Palette
// ============================================================================

/// CSS colors for one theme variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmlPalette {
    pub background: &'static str,
    pub text: &'static str,
    pub button: &'static str,
    pub link: &'static str,
    /// Rule under the subtitle
    pub accent: &'static str,
}

impl HtmlPalette {
    pub const LIGHT: Self = Self {
        background: "#f6f6f6",
        text: "#000000",
        button: "#D0D0D0",
        link: "#97ACE5",
        accent: "#33b5e5",
    };

    pub const DARK: Self = Self {
        background: "#181b1f",
        text: "#C0C0C0",
        button: "#505050",
        link: "#97ACE5",
        accent: "#33b5e5",
    };
}
