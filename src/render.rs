//! Entry document renderer.
//!
//! Turns an entry into a self-contained HTML document. Rendering is pure:
//! the same entry, flag and options always produce byte-identical output.
//!
//! Buttons in the document are plain links with the `pageturn://` scheme;
//! the display surface reports clicks on them like any other link and
//! [`ReaderCommand::from_link`](crate::reader::ReaderCommand::from_link)
//! maps them back to commands.

use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

use crate::config::Config;
use crate::enclosure;
use crate::storage::Entry;
use crate::theme::{HtmlPalette, ThemeVariant};
use crate::util::format_timestamp;

/// Placeholder for locally stored pictures in entry bodies.
pub const IMAGE_ID_TOKEN: &str = "##PAGETURN_IMAGE_ID##";
pub const IMAGE_ID_SEPARATOR: &str = "__";

pub const LINK_FULL_TEXT: &str = "pageturn://full-text";
pub const LINK_ORIGINAL: &str = "pageturn://original";
pub const LINK_ENCLOSURE: &str = "pageturn://enclosure";

pub const LABEL_FULL_TEXT: &str = "get full text";
pub const LABEL_ORIGINAL: &str = "show original";
pub const LABEL_ENCLOSURE: &str = "see enclosure";
pub const LABEL_LINK: &str = "see link";

/// Base url handed to the display surface with every document.
pub const BASE_URL: &str = "";

const IMG_TAG_PATTERN: &str = r"(?i)<[/]?[ ]?img(.|\n)*?>";

/// `None` only if the pattern fails to compile; pictures are then kept.
fn img_tag_regex() -> Option<&'static Regex> {
    static IMG_TAG: OnceLock<Option<Regex>> = OnceLock::new();
    IMG_TAG
        .get_or_init(|| match Regex::new(IMG_TAG_PATTERN) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::error!(error = %e, "Invalid picture pattern");
                None
            }
        })
        .as_ref()
}

/// Rendering inputs that do not come from the entry itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub theme: ThemeVariant,
    /// 0 = default body styling, >0 wraps the document in a larger font
    pub font_size_step: u32,
    pub disable_pictures: bool,
    pub date_format: String,
    pub time_format: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            theme: config.theme_variant(),
            font_size_step: config.font_size,
            disable_pictures: config.disable_pictures,
            date_format: config.date_format.clone(),
            time_format: config.time_format.clone(),
        }
    }
}

/// Pick the body for an entry and apply the picture rewrites.
///
/// Full text wins only when requested and present; a missing body renders
/// as the empty string.
pub fn entry_body(entry: &Entry, prefer_full_text: bool, options: &RenderOptions) -> String {
    let body = if prefer_full_text {
        entry.mobilized_html.as_deref().or(entry.abstract_html.as_deref())
    } else {
        entry.abstract_html.as_deref()
    };
    let mut body = body.unwrap_or_default().to_string();

    if body.contains(IMAGE_ID_TOKEN) {
        body = body.replace(IMAGE_ID_TOKEN, &format!("{}{}", entry.id, IMAGE_ID_SEPARATOR));
    }

    if options.disable_pictures {
        if let Some(re) = img_tag_regex() {
            body = re.replace_all(&body, "").into_owned();
        }
    }

    body
}

/// Render the full document for an entry.
pub fn render(entry: &Entry, prefer_full_text: bool, options: &RenderOptions) -> String {
    let palette = options.theme.palette();
    let body = entry_body(entry, prefer_full_text, options);
    let link = entry.link.as_deref().unwrap_or_default();

    let mut html = String::with_capacity(body.len() + 2048);
    push_head(&mut html, &palette);
    // Writes into a String are infallible
    let _ = write!(
        html,
        "<body link='{}' text='{}'>",
        palette.link, palette.text
    );
    if options.font_size_step > 0 {
        let _ = write!(html, "<font size='+{}'>", options.font_size_step);
    }

    let _ = write!(
        html,
        "<p style='margin-top:1cm; margin-bottom:0.6cm'><font size='+2'>\
         <a href='{}' style='text-decoration: none; color:inherit'>{}</a></font></p>",
        html_escape::encode_single_quoted_attribute(link),
        html_escape::encode_text(&entry.title)
    );

    let mut subtitle = format_timestamp(
        entry.published_at,
        &options.date_format,
        &options.time_format,
    );
    if let Some(author) = entry.author.as_deref().filter(|a| !a.is_empty()) {
        let _ = write!(subtitle, " &mdash; {}", html_escape::encode_text(author));
    }
    let _ = write!(
        html,
        "<font size='-1'>{}</font>\
         <div style='width:100%; border:0px; height:1px; margin-top:0.1cm; background:{}'></div>\
         <br/><div align='justify'>{}</div><br/>",
        subtitle, palette.accent, body
    );

    if prefer_full_text {
        push_button(&mut html, &palette, LINK_ORIGINAL, LABEL_ORIGINAL, false);
    } else {
        push_button(&mut html, &palette, LINK_FULL_TEXT, LABEL_FULL_TEXT, false);
    }

    if enclosure::is_displayable(entry.enclosure.as_deref()) {
        push_button(&mut html, &palette, LINK_ENCLOSURE, LABEL_ENCLOSURE, false);
    }

    if !link.is_empty() {
        push_button(&mut html, &palette, link, LABEL_LINK, true);
    }

    if options.font_size_step > 0 {
        html.push_str("</font>");
    }
    html.push_str("<br/><br/><br/><br/></body></html>");
    html
}

fn push_head(html: &mut String, palette: &HtmlPalette) {
    let _ = write!(
        html,
        "<html><head><meta charset='utf-8'/><style type='text/css'>\
         body {{background-color:{}; max-width: 100%; font-family: sans-serif-light}}\n\
         img {{max-width: 100%; height: auto;}}\n\
         div[style] {{max-width: 100%;}}\n\
         pre {{white-space: pre-wrap;}}</style></head>",
        palette.background
    );
}

fn push_button(html: &mut String, palette: &HtmlPalette, href: &str, label: &str, spaced: bool) {
    let margin = if spaced { "; margin-top:0.4cm" } else { "" };
    let _ = write!(
        html,
        "<div style='text-align: center{}'><a href='{}' style='display: inline-block; \
         background-color:{}; color:{}; text-decoration: none; border: none; \
         border-radius:0.2cm; padding: 0.3cm;'>{}</a></div>",
        margin,
        html_escape::encode_single_quoted_attribute(href),
        palette.button,
        palette.text,
        label
    );
}
