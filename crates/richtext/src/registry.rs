//! Format table: the construction and reading strategy for every format name.
//!
//! Each entry maps a format name to its scope, its primary tag and a
//! [`FormatStrategy`] that can build a detached [`Element`] for a value and
//! read the value back out of an element. The HTML converter resolves
//! formats through this table, so a format that is not in the table (or not
//! in the allow list) can never be produced by conversion.

use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::config::EditorConfig;
use crate::formats::{AllowList, ANCHOR, BREAK};

/// Protocols a link may keep. Relative URLs are always kept.
pub const LINK_PROTOCOLS: [&str; 5] = ["http", "https", "mailto", "tel", "ftp"];
pub const SANITIZED_URL: &str = "about:blank";

static EXTERNAL_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^((http|https|ftp)://)").expect("valid external url pattern"));
static URL_SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):").expect("valid scheme pattern"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

// ── Element ───────────────────────────────────────────────────────────────

/// Detached description of a markup element: tag plus ordered attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_uppercase(),
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// Class suffix for `prefix`, e.g. `ql-align-` on `ql-align-center` gives `center`.
    pub fn class_value(&self, prefix: &str) -> Option<&str> {
        self.attr("class")?
            .split_whitespace()
            .find_map(|c| c.strip_prefix(prefix))
            .filter(|v| !v.is_empty())
    }

    /// Value of one inline style property.
    pub fn style(&self, property: &str) -> Option<String> {
        self.attr("style")?.split(';').find_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            if name.trim().eq_ignore_ascii_case(property) {
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            } else {
                None
            }
        })
    }
}

// ── Strategy ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Attribute on a run of text.
    Inline,
    /// Attribute on a line terminator.
    Block,
    /// Standalone content of length one.
    Embed,
}

pub trait FormatStrategy: fmt::Debug + Send + Sync {
    /// Build an element carrying `value`.
    fn create(&self, value: &Value) -> Element;

    /// Read this format's value off an element, if the element carries it.
    fn read(&self, element: &Element) -> Option<Value>;

    /// Update an existing element to carry `value`.
    fn apply(&self, element: &mut Element, value: &Value) {
        let created = self.create(value);
        element.attributes.extend(created.attributes);
    }
}

fn value_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

/// Boolean format expressed by the tag alone (`<strong>`, `<pre>`, ...).
#[derive(Debug)]
pub struct TagFormat {
    pub tags: &'static [&'static str],
}

impl FormatStrategy for TagFormat {
    fn create(&self, _value: &Value) -> Element {
        Element::new(self.tags[0])
    }

    fn read(&self, element: &Element) -> Option<Value> {
        self.tags
            .iter()
            .any(|t| element.is(t))
            .then_some(Value::Bool(true))
    }
}

#[derive(Debug)]
pub struct HeaderFormat;

impl FormatStrategy for HeaderFormat {
    fn create(&self, value: &Value) -> Element {
        let level = value.as_u64().filter(|l| (1..=6).contains(l)).unwrap_or(1);
        Element::new(&format!("H{level}"))
    }

    fn read(&self, element: &Element) -> Option<Value> {
        let level = element.tag.strip_prefix('H')?.parse::<u64>().ok()?;
        (1..=6).contains(&level).then(|| Value::from(level))
    }
}

#[derive(Debug)]
pub struct ScriptFormat;

impl FormatStrategy for ScriptFormat {
    fn create(&self, value: &Value) -> Element {
        match value.as_str() {
            Some("super") => Element::new("SUP"),
            _ => Element::new("SUB"),
        }
    }

    fn read(&self, element: &Element) -> Option<Value> {
        match element.tag.as_str() {
            "SUB" => Some(Value::from("sub")),
            "SUP" => Some(Value::from("super")),
            _ => None,
        }
    }
}

/// List item; the converter stamps `data-list` from the enclosing `<ol>`/`<ul>`.
#[derive(Debug)]
pub struct ListFormat;

impl FormatStrategy for ListFormat {
    fn create(&self, value: &Value) -> Element {
        Element::new("LI").with_attr("data-list", value_str(value))
    }

    fn read(&self, element: &Element) -> Option<Value> {
        if !element.is("LI") {
            return None;
        }
        element.attr("data-list").map(Value::from)
    }
}

/// Inline style attributor (`color`, `background-color`, ...).
#[derive(Debug)]
pub struct StyleFormat {
    pub property: &'static str,
}

impl FormatStrategy for StyleFormat {
    fn create(&self, value: &Value) -> Element {
        Element::new("SPAN").with_attr("style", format!("{}: {}", self.property, value_str(value)))
    }

    fn read(&self, element: &Element) -> Option<Value> {
        element.style(self.property).map(Value::from)
    }
}

/// Class attributor (`ql-align-center`, `ql-indent-2`, ...).
#[derive(Debug)]
pub struct ClassFormat {
    pub prefix: &'static str,
}

impl FormatStrategy for ClassFormat {
    fn create(&self, value: &Value) -> Element {
        Element::new("P").with_attr("class", format!("{}{}", self.prefix, value_str(value)))
    }

    fn read(&self, element: &Element) -> Option<Value> {
        let raw = element.class_value(self.prefix)?;
        Some(raw.parse::<u64>().map(Value::from).unwrap_or_else(|_| Value::from(raw)))
    }
}

/// Embed whose value lives in one attribute (`<img src>`, `<iframe src>`).
#[derive(Debug)]
pub struct SourceEmbed {
    pub tag: &'static str,
    pub attr: &'static str,
    pub class: Option<&'static str>,
}

impl FormatStrategy for SourceEmbed {
    fn create(&self, value: &Value) -> Element {
        let el = Element::new(self.tag).with_attr(self.attr, value_str(value));
        match self.class {
            Some(class) => el.with_attr("class", class),
            None => el,
        }
    }

    fn read(&self, element: &Element) -> Option<Value> {
        if !element.is(self.tag) || self.class.is_some_and(|c| !element.has_class(c)) {
            return None;
        }
        element.attr(self.attr).map(Value::from)
    }
}

/// `<br>` soft line break.
#[derive(Debug)]
pub struct BreakFormat;

impl FormatStrategy for BreakFormat {
    fn create(&self, _value: &Value) -> Element {
        Element::new("BR")
    }

    fn read(&self, element: &Element) -> Option<Value> {
        element.is("BR").then_some(Value::Bool(true))
    }
}

/// In-document anchor: `<span class="ql-anchor" id="...">`.
#[derive(Debug)]
pub struct AnchorFormat;

impl AnchorFormat {
    pub const CLASS: &'static str = "ql-anchor";

    /// Collapse whitespace runs to `-` and lowercase.
    pub fn sanitize(id: &str) -> String {
        WHITESPACE.replace_all(id, "-").to_lowercase()
    }
}

impl FormatStrategy for AnchorFormat {
    fn create(&self, value: &Value) -> Element {
        Element::new("SPAN")
            .with_attr("id", Self::sanitize(&value_str(value)))
            .with_attr("class", Self::CLASS)
    }

    fn read(&self, element: &Element) -> Option<Value> {
        if !element.is("SPAN") || !element.has_class(Self::CLASS) {
            return None;
        }
        element.attr("id").map(Value::from)
    }

    fn apply(&self, element: &mut Element, value: &Value) {
        if truthy(value) {
            element.set_attr("id", Self::sanitize(&value_str(value)));
        }
    }
}

/// Hyperlink. External links open in a new tab unless they point under the
/// configured base URL.
#[derive(Debug, Clone, Default)]
pub struct LinkFormat {
    base_url: Option<String>,
}

impl LinkFormat {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.filter(|b| !b.is_empty()),
        }
    }

    /// Replace URLs with a disallowed protocol by [`SANITIZED_URL`].
    pub fn sanitize(url: &str) -> String {
        match URL_SCHEME.captures(url.trim_start()) {
            Some(caps) => {
                let scheme = caps[1].to_ascii_lowercase();
                if LINK_PROTOCOLS.contains(&scheme.as_str()) {
                    url.to_string()
                } else {
                    SANITIZED_URL.to_string()
                }
            }
            None => url.to_string(),
        }
    }

    /// `Some("_blank")` for absolute http/https/ftp URLs outside the base URL.
    pub fn target(&self, url: &str) -> Option<&'static str> {
        if !EXTERNAL_URL.is_match(url) {
            return None;
        }
        if let Some(base) = &self.base_url {
            if url.starts_with(base.as_str()) {
                return None;
            }
        }
        Some("_blank")
    }

    fn set_target(&self, element: &mut Element, url: &str) {
        match self.target(url) {
            Some(target) => element.set_attr("target", target),
            None => {
                element.remove_attr("target");
            }
        }
    }
}

impl FormatStrategy for LinkFormat {
    fn create(&self, value: &Value) -> Element {
        let url = Self::sanitize(&value_str(value));
        let mut el = Element::new("A").with_attr("href", url.clone());
        self.set_target(&mut el, &url);
        el
    }

    fn read(&self, element: &Element) -> Option<Value> {
        if !element.is("A") {
            return None;
        }
        element.attr("href").map(|href| Value::from(Self::sanitize(href)))
    }

    fn apply(&self, element: &mut Element, value: &Value) {
        if !truthy(value) {
            element.remove_attr("href");
            element.remove_attr("target");
            return;
        }
        let url = Self::sanitize(&value_str(value));
        element.set_attr("href", url.clone());
        self.set_target(element, &url);
    }
}

// ── Table ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FormatDef {
    pub name: String,
    pub scope: Scope,
    pub strategy: Box<dyn FormatStrategy>,
}

impl FormatDef {
    pub fn new(name: &str, scope: Scope, strategy: impl FormatStrategy + 'static) -> Self {
        Self {
            name: name.to_string(),
            scope,
            strategy: Box::new(strategy),
        }
    }
}

#[derive(Debug, Default)]
pub struct FormatTable {
    defs: IndexMap<String, FormatDef>,
}

impl FormatTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the reserved formats and the whole default catalog.
    pub fn standard(config: &EditorConfig) -> Self {
        let mut t = Self::new();
        t.register(FormatDef::new(BREAK, Scope::Embed, BreakFormat));
        t.register(FormatDef::new(ANCHOR, Scope::Inline, AnchorFormat));
        t.register(FormatDef::new("link", Scope::Inline, config.link_format()));

        t.register(FormatDef::new("bold", Scope::Inline, TagFormat { tags: &["STRONG", "B"] }));
        t.register(FormatDef::new("italic", Scope::Inline, TagFormat { tags: &["EM", "I"] }));
        t.register(FormatDef::new("underline", Scope::Inline, TagFormat { tags: &["U"] }));
        t.register(FormatDef::new(
            "strike",
            Scope::Inline,
            TagFormat { tags: &["S", "STRIKE", "DEL"] },
        ));
        t.register(FormatDef::new("code", Scope::Inline, TagFormat { tags: &["CODE"] }));
        t.register(FormatDef::new("script", Scope::Inline, ScriptFormat));
        t.register(FormatDef::new("color", Scope::Inline, StyleFormat { property: "color" }));
        t.register(FormatDef::new(
            "background",
            Scope::Inline,
            StyleFormat { property: "background-color" },
        ));
        t.register(FormatDef::new("font", Scope::Inline, StyleFormat { property: "font-family" }));
        t.register(FormatDef::new("size", Scope::Inline, StyleFormat { property: "font-size" }));
        t.register(FormatDef::new(
            "formula",
            Scope::Embed,
            SourceEmbed { tag: "SPAN", attr: "data-value", class: Some("ql-formula") },
        ));

        t.register(FormatDef::new("header", Scope::Block, HeaderFormat));
        t.register(FormatDef::new("blockquote", Scope::Block, TagFormat { tags: &["BLOCKQUOTE"] }));
        t.register(FormatDef::new("code-block", Scope::Block, TagFormat { tags: &["PRE"] }));
        t.register(FormatDef::new("list", Scope::Block, ListFormat));
        t.register(FormatDef::new("align", Scope::Block, ClassFormat { prefix: "ql-align-" }));
        t.register(FormatDef::new(
            "direction",
            Scope::Block,
            ClassFormat { prefix: "ql-direction-" },
        ));
        t.register(FormatDef::new("indent", Scope::Block, ClassFormat { prefix: "ql-indent-" }));

        t.register(FormatDef::new(
            "image",
            Scope::Embed,
            SourceEmbed { tag: "IMG", attr: "src", class: None },
        ));
        t.register(FormatDef::new(
            "video",
            Scope::Embed,
            SourceEmbed { tag: "IFRAME", attr: "src", class: Some("ql-video") },
        ));
        t
    }

    /// Add or replace a definition.
    pub fn register(&mut self, def: FormatDef) {
        self.defs.insert(def.name.clone(), def);
    }

    pub fn lookup(&self, name: &str) -> Option<&FormatDef> {
        self.defs.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormatDef> {
        self.defs.values()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Allowed formats an element carries, in table order.
    pub fn read_element<'a>(
        &'a self,
        element: &Element,
        allow: &AllowList,
    ) -> Vec<(&'a FormatDef, Value)> {
        self.defs
            .values()
            .filter(|def| allow.contains(&def.name))
            .filter_map(|def| def.strategy.read(element).map(|v| (def, v)))
            .collect()
    }

    /// Build the element for `name` = `value`, if the format is registered.
    pub fn create(&self, name: &str, value: &Value) -> Option<Element> {
        self.lookup(name).map(|def| def.strategy.create(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{build_allow_list, ToolbarEntry, DEFAULT_FORMATS, RESERVED_FORMATS};
    use serde_json::json;

    fn link(base: Option<&str>) -> LinkFormat {
        LinkFormat::new(base.map(str::to_string))
    }

    #[test]
    fn absolute_links_open_in_new_tab() {
        let l = link(None);
        for url in ["http://a.com", "https://a.com/x", "ftp://files.a.com"] {
            let el = l.create(&json!(url));
            assert_eq!(el.attr("target"), Some("_blank"), "{url}");
            assert_eq!(el.attr("href"), Some(url));
        }
    }

    #[test]
    fn relative_links_have_no_target() {
        let l = link(None);
        for url in ["/about", "page.html", "#top", "mailto:a@b.c"] {
            assert_eq!(l.create(&json!(url)).attr("target"), None, "{url}");
        }
    }

    #[test]
    fn base_url_links_have_no_target() {
        let l = link(Some("https://app.example.com"));
        let el = l.create(&json!("https://app.example.com/forms/1"));
        assert_eq!(el.attr("target"), None);
        let el = l.create(&json!("https://other.example.com"));
        assert_eq!(el.attr("target"), Some("_blank"));
    }

    #[test]
    fn empty_base_url_is_ignored() {
        let l = link(Some(""));
        assert_eq!(l.target("https://a.com"), Some("_blank"));
    }

    #[test]
    fn apply_recomputes_target() {
        let l = link(Some("https://app.example.com"));
        let mut el = l.create(&json!("https://a.com"));
        l.apply(&mut el, &json!("https://app.example.com/x"));
        assert_eq!(el.attr("target"), None);
        l.apply(&mut el, &json!("https://b.com"));
        assert_eq!(el.attr("target"), Some("_blank"));
        l.apply(&mut el, &json!(false));
        assert_eq!(el.attr("href"), None);
    }

    #[test]
    fn dangerous_protocols_are_sanitized() {
        assert_eq!(LinkFormat::sanitize("javascript:alert(1)"), SANITIZED_URL);
        assert_eq!(LinkFormat::sanitize("JaVaScRiPt:alert(1)"), SANITIZED_URL);
        assert_eq!(LinkFormat::sanitize("https://ok.com"), "https://ok.com");
        assert_eq!(LinkFormat::sanitize("tel:123"), "tel:123");
        let el = link(None).create(&json!("data:text/html,x"));
        assert_eq!(el.attr("href"), Some(SANITIZED_URL));
        assert_eq!(el.attr("target"), None);
    }

    #[test]
    fn anchor_ids_are_sanitized() {
        assert_eq!(AnchorFormat::sanitize("My  Section\tTwo"), "my-section-two");
        let el = AnchorFormat.create(&json!("Intro Part"));
        assert_eq!(el.attr("id"), Some("intro-part"));
        assert!(el.has_class(AnchorFormat::CLASS));
        assert_eq!(AnchorFormat.read(&el), Some(json!("intro-part")));
    }

    #[test]
    fn anchor_apply_ignores_empty_value() {
        let mut el = AnchorFormat.create(&json!("a"));
        AnchorFormat.apply(&mut el, &json!(""));
        assert_eq!(el.attr("id"), Some("a"));
        AnchorFormat.apply(&mut el, &json!("New Id"));
        assert_eq!(el.attr("id"), Some("new-id"));
    }

    #[test]
    fn plain_span_is_not_an_anchor() {
        let el = Element::new("span").with_attr("id", "x");
        assert_eq!(AnchorFormat.read(&el), None);
    }

    #[test]
    fn standard_table_covers_catalog_and_reserved() {
        let table = FormatTable::standard(&EditorConfig::default());
        for name in DEFAULT_FORMATS.iter().chain(RESERVED_FORMATS.iter()) {
            assert!(table.lookup(name).is_some(), "{name}");
        }
        assert_eq!(table.len(), DEFAULT_FORMATS.len() + RESERVED_FORMATS.len());
    }

    #[test]
    fn read_element_respects_allow_list() {
        let table = FormatTable::standard(&EditorConfig::default());
        let el = Element::new("span").with_attr("style", "color: red; font-size: 12px");
        let allow = build_allow_list(&[ToolbarEntry::name("size")]);
        let found: Vec<_> = table
            .read_element(&el, &allow)
            .into_iter()
            .map(|(d, v)| (d.name.clone(), v))
            .collect();
        assert_eq!(found, vec![("size".to_string(), json!("12px"))]);
    }

    #[test]
    fn header_and_class_formats_read_values() {
        assert_eq!(HeaderFormat.read(&Element::new("h3")), Some(json!(3)));
        assert_eq!(HeaderFormat.read(&Element::new("hr")), None);
        let el = Element::new("p").with_attr("class", "ql-indent-2 ql-align-center");
        assert_eq!(ClassFormat { prefix: "ql-indent-" }.read(&el), Some(json!(2)));
        assert_eq!(ClassFormat { prefix: "ql-align-" }.read(&el), Some(json!("center")));
    }

    #[test]
    fn style_lookup_is_case_insensitive() {
        let el = Element::new("span").with_attr("style", "Color:blue;");
        assert_eq!(el.style("color").as_deref(), Some("blue"));
        assert_eq!(el.style("background-color"), None);
    }
}
