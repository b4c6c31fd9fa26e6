//! Structural analysis of the page under test.
//!
//! Collects the interactive elements of an HTML page together with the
//! attributes a browser-automation script can locate them by.

use std::collections::{BTreeSet, HashMap};

use scraper::{ElementRef, Html};
use tracing::debug;

/// Longest element text kept, in characters.
const MAX_TEXT_CHARS: usize = 80;

/// Broad classification of an element for automation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    TextInput,
    Checkbox,
    Radio,
    Select,
    TextArea,
    Button,
    Link,
    Form,
    /// Any other element carrying an `id` (containers, labels, totals).
    Other,
}

impl ElementKind {
    /// Whether the element accepts typed text.
    pub fn accepts_text(&self) -> bool {
        matches!(self, Self::TextInput | Self::TextArea)
    }

    /// Whether the element is activated by clicking.
    pub fn is_clickable(&self) -> bool {
        matches!(self, Self::Button | Self::Link | Self::Checkbox | Self::Radio)
    }
}

/// How a [`Selector`] locates its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStrategy {
    Id,
    Name,
    Css,
}

/// A locator for one element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub strategy: LocatorStrategy,
    pub value: String,
}

/// One interactive element of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlElement {
    pub tag: String,
    pub kind: ElementKind,
    pub id: Option<String>,
    pub name: Option<String>,
    /// The `type` attribute of inputs and buttons.
    pub input_type: Option<String>,
    pub placeholder: Option<String>,
    /// Text of an associated `<label for=...>` or the `aria-label`.
    pub label: Option<String>,
    pub classes: Vec<String>,
    /// Visible text, whitespace-collapsed and truncated.
    pub text: String,
    /// `href` of links.
    pub href: Option<String>,
}

impl HtmlElement {
    /// Preferred locator: `id`, then `name`, then a CSS selector.
    pub fn selector(&self) -> Selector {
        if let Some(id) = &self.id {
            return Selector {
                strategy: LocatorStrategy::Id,
                value: id.clone(),
            };
        }
        if let Some(name) = &self.name {
            return Selector {
                strategy: LocatorStrategy::Name,
                value: name.clone(),
            };
        }
        Selector {
            strategy: LocatorStrategy::Css,
            value: self.css_selector(),
        }
    }

    fn css_selector(&self) -> String {
        let mut css = self.tag.clone();
        let classes: Vec<&String> = self.classes.iter().filter(|c| is_css_identifier(c)).collect();
        if !classes.is_empty() {
            for class in classes {
                css.push('.');
                css.push_str(class);
            }
            return css;
        }
        let attr = match (&self.input_type, &self.href) {
            (Some(t), _) => Some(("type", t)),
            (None, Some(h)) if self.kind == ElementKind::Link => Some(("href", h)),
            _ => None,
        };
        if let Some((key, value)) = attr.filter(|(_, v)| !v.contains(['\'', '\\'])) {
            css.push_str(&format!("[{key}='{value}']"));
        }
        css
    }

    /// Lowercased words describing the element, used to match it against
    /// test-step text.
    pub fn descriptor_terms(&self) -> BTreeSet<String> {
        let sources = [
            self.id.as_deref(),
            self.name.as_deref(),
            self.placeholder.as_deref(),
            self.label.as_deref(),
            Some(self.text.as_str()),
        ];

        sources
            .into_iter()
            .flatten()
            .flat_map(|s| s.split(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.len() > 1)
            .map(str::to_lowercase)
            .collect()
    }
}

/// The analysed page: its title and interactive elements in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlStructure {
    pub title: Option<String>,
    pub elements: Vec<HtmlElement>,
}

impl HtmlStructure {
    /// Parse `html` and collect its interactive elements.
    pub fn parse(html: &str) -> Self {
        let doc = Html::parse_document(html);

        let title = select_first_text(&doc, "title").filter(|t| !t.is_empty());
        let labels = collect_labels(&doc);

        let mut elements = Vec::new();
        if let Ok(sel) = scraper::Selector::parse("input, button, select, textarea, a, form, [id]") {
            for el in doc.select(&sel) {
                if let Some(element) = analyse(&el, &labels) {
                    elements.push(element);
                }
            }
        }

        debug!(elements = elements.len(), "analysed page structure");
        Self { title, elements }
    }

    /// Elements of the given kind.
    pub fn of_kind(&self, kind: ElementKind) -> impl Iterator<Item = &HtmlElement> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    pub fn find_by_id(&self, id: &str) -> Option<&HtmlElement> {
        self.elements.iter().find(|e| e.id.as_deref() == Some(id))
    }
}

fn analyse(el: &ElementRef, labels: &HashMap<String, String>) -> Option<HtmlElement> {
    let value = el.value();
    let tag = value.name().to_ascii_lowercase();
    let input_type = value.attr("type").map(str::to_ascii_lowercase);

    let kind = match tag.as_str() {
        "input" => match input_type.as_deref() {
            Some("hidden") => return None,
            Some("checkbox") => ElementKind::Checkbox,
            Some("radio") => ElementKind::Radio,
            Some("submit" | "button" | "reset" | "image") => ElementKind::Button,
            _ => ElementKind::TextInput,
        },
        "button" => ElementKind::Button,
        "select" => ElementKind::Select,
        "textarea" => ElementKind::TextArea,
        "a" => ElementKind::Link,
        "form" => ElementKind::Form,
        "html" | "head" | "body" | "script" | "style" | "meta" | "link" => return None,
        _ => ElementKind::Other,
    };

    let id = non_empty(value.attr("id"));
    let label = id
        .as_ref()
        .and_then(|id| labels.get(id).cloned())
        .or_else(|| non_empty(value.attr("aria-label")));

    let mut text = collapse(&el.text().collect::<String>());
    if tag == "input" && text.is_empty() {
        text = value.attr("value").map(collapse).unwrap_or_default();
    }

    Some(HtmlElement {
        kind,
        id,
        name: non_empty(value.attr("name")),
        input_type,
        placeholder: non_empty(value.attr("placeholder")),
        label,
        classes: value.classes().map(str::to_string).collect(),
        text: truncate(&text, MAX_TEXT_CHARS),
        href: non_empty(value.attr("href")),
        tag,
    })
}

/// Map of `label[for]` target id to label text.
fn collect_labels(doc: &Html) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    if let Ok(sel) = scraper::Selector::parse("label[for]") {
        for label in doc.select(&sel) {
            if let Some(target) = label.value().attr("for") {
                labels.insert(target.to_string(), collapse(&label.text().collect::<String>()));
            }
        }
    }
    labels
}

fn select_first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = scraper::Selector::parse(selector).ok()?;
    doc.select(&sel)
        .next()
        .map(|el| collapse(&el.text().collect::<String>()))
}

/// Whether `class` can be used in a selector without escaping.
fn is_css_identifier(class: &str) -> bool {
    let body = class.strip_prefix('-').unwrap_or(class);
    body.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && body.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKOUT: &str = r#"<!DOCTYPE html>
<html>
<head><title>E-Shop Checkout</title></head>
<body>
  <h1>Checkout</h1>
  <form id="checkout-form">
    <label for="discount-code">Discount Code</label>
    <input type="text" id="discount-code" placeholder="Enter code">
    <button id="apply-discount" type="button">Apply</button>
    <input type="email" name="email" placeholder="Email">
    <input type="hidden" name="csrf" value="x">
    <select name="shipping"><option>Standard</option><option>Express</option></select>
    <input type="radio" class="pay-option" value="paypal">
    <button type="submit" class="btn primary">Pay Now</button>
  </form>
  <a href="/cart">Back to cart</a>
  <div id="total">$100.00</div>
</body>
</html>"#;

    #[test]
    fn parses_title_and_elements() {
        let page = HtmlStructure::parse(CHECKOUT);
        assert_eq!(page.title.as_deref(), Some("E-Shop Checkout"));

        // form, discount input, apply button, email, select, radio, pay button, link, total div
        assert_eq!(page.elements.len(), 9);
        assert!(page.elements.iter().all(|e| e.name.as_deref() != Some("csrf")));
    }

    #[test]
    fn label_is_resolved_by_for_attribute() {
        let page = HtmlStructure::parse(CHECKOUT);
        let input = page.find_by_id("discount-code").unwrap();
        assert_eq!(input.kind, ElementKind::TextInput);
        assert_eq!(input.label.as_deref(), Some("Discount Code"));
        assert_eq!(input.placeholder.as_deref(), Some("Enter code"));
    }

    #[test]
    fn selector_priority() {
        let page = HtmlStructure::parse(CHECKOUT);

        let by_id = page.find_by_id("apply-discount").unwrap().selector();
        assert_eq!(by_id.strategy, LocatorStrategy::Id);
        assert_eq!(by_id.value, "apply-discount");

        let select = page.of_kind(ElementKind::Select).next().unwrap();
        assert_eq!(select.selector().strategy, LocatorStrategy::Name);
        assert_eq!(select.selector().value, "shipping");

        let pay = page
            .of_kind(ElementKind::Button)
            .find(|b| b.text == "Pay Now")
            .unwrap();
        assert_eq!(pay.selector().strategy, LocatorStrategy::Css);
        assert_eq!(pay.selector().value, "button.btn.primary");

        let link = page.of_kind(ElementKind::Link).next().unwrap();
        assert_eq!(link.selector().value, "a[href='/cart']");
    }

    #[test]
    fn css_selector_skips_classes_needing_escapes() {
        let page = HtmlStructure::parse(
            r#"<button class="hover:bg-red w-1/2 btn 2col">Save</button>
               <button type="submit" class="md:flex">Send</button>"#,
        );
        let buttons: Vec<_> = page.of_kind(ElementKind::Button).collect();
        assert_eq!(buttons[0].selector().value, "button.btn");
        assert_eq!(buttons[1].selector().value, "button[type='submit']");
    }

    #[test]
    fn descriptor_terms_cover_attributes() {
        let page = HtmlStructure::parse(CHECKOUT);
        let terms = page.find_by_id("discount-code").unwrap().descriptor_terms();
        assert!(terms.contains("discount"));
        assert!(terms.contains("code"));
        assert!(terms.contains("enter"));
    }

    #[test]
    fn empty_page_has_no_elements() {
        let page = HtmlStructure::parse("<html><body><p>Nothing here</p></body></html>");
        assert!(page.title.is_none());
        assert!(page.elements.is_empty());
    }
}
