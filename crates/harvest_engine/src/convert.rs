use std::collections::HashMap;
use std::sync::LazyLock;

use html2md::common::get_tag_attr;
use html2md::{Handle, StructuredPrinter, TagHandler, TagHandlerFactory};
use regex::Regex;

/// Backslash escapes html2md puts in front of markdown-significant text.
static MARKDOWN_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([<>*\\_~=+\-#])").expect("static regex"));
static TRAILING_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)[ \t]+$").expect("static regex"));

pub trait Converter: Send + Sync {
    fn to_text(&self, html: &str) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Keep anchors as `[text](url)` instead of their text alone.
    pub link_urls: bool,
}

/// Message markup to plain text with light markdown, via html2md.
///
/// Anchors keep their text, emoji images become their shortcode, list items
/// holding a paragraph stay on the bullet line, and text escapes are undone.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextConverter {
    options: ConvertOptions,
}

impl HtmlTextConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    fn handlers(&self) -> HashMap<String, Box<dyn TagHandlerFactory>> {
        let mut handlers: HashMap<String, Box<dyn TagHandlerFactory>> = HashMap::new();
        if !self.options.link_urls {
            handlers.insert("a".to_string(), Box::new(AnchorTextFactory));
        }
        handlers.insert("img".to_string(), Box::new(EmojiFactory));
        handlers.insert("p".to_string(), Box::new(ParagraphFactory));
        for tag in ["script", "style", "noscript", "template"] {
            handlers.insert(tag.to_string(), Box::new(SkipFactory));
        }
        handlers
    }
}

impl Converter for HtmlTextConverter {
    fn to_text(&self, html: &str) -> String {
        let markdown = html2md::parse_html_custom(html, &self.handlers());
        let unescaped = MARKDOWN_ESCAPE.replace_all(&markdown, "$1");
        TRAILING_SPACES.replace_all(&unescaped, "").trim().to_string()
    }
}

struct AnchorTextFactory;

impl TagHandlerFactory for AnchorTextFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(AnchorText)
    }
}

/// Children are printed as usual; the href is dropped.
struct AnchorText;

impl TagHandler for AnchorText {
    fn handle(&mut self, _tag: &Handle, _printer: &mut StructuredPrinter) {}

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

struct EmojiFactory;

impl TagHandlerFactory for EmojiFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(Emoji)
    }
}

struct Emoji;

impl TagHandler for Emoji {
    fn handle(&mut self, tag: &Handle, printer: &mut StructuredPrinter) {
        let code = get_tag_attr(tag, "data-stringify-emoji").or_else(|| get_tag_attr(tag, "alt"));
        if let Some(code) = code.filter(|c| !c.trim().is_empty()) {
            printer.append_str(code.trim());
        }
    }

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}
}

struct ParagraphFactory;

impl TagHandlerFactory for ParagraphFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(Paragraph::default())
    }
}

/// Blank line around paragraphs, except inside a list item where the text
/// continues the bullet line.
#[derive(Default)]
struct Paragraph {
    in_list_item: bool,
}

impl TagHandler for Paragraph {
    fn handle(&mut self, _tag: &Handle, printer: &mut StructuredPrinter) {
        self.in_list_item = printer.parent_chain.last().is_some_and(|tag| tag == "li");
        if self.in_list_item {
            if !printer.data.ends_with(char::is_whitespace) {
                printer.insert_newline();
            }
        } else {
            printer.insert_newline();
            printer.insert_newline();
        }
    }

    fn after_handle(&mut self, printer: &mut StructuredPrinter) {
        if !self.in_list_item {
            printer.insert_newline();
            printer.insert_newline();
        }
    }
}

struct SkipFactory;

impl TagHandlerFactory for SkipFactory {
    fn instantiate(&self) -> Box<dyn TagHandler> {
        Box::new(Skip)
    }
}

struct Skip;

impl TagHandler for Skip {
    fn handle(&mut self, _tag: &Handle, _printer: &mut StructuredPrinter) {}

    fn after_handle(&mut self, _printer: &mut StructuredPrinter) {}

    fn skip_descendants(&self) -> bool {
        true
    }
}
