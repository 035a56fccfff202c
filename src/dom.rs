//! Document snapshots built from fetched HTML.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Child of an element: a text run or the index of a child element
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChildNode {
    Text(String),
    Element(usize),
}

/// One element of the flattened DOM, in document order
///
/// Only direct children are recorded; subtree text and markup are rebuilt
/// from the table when needed.
#[derive(Debug, Clone, Serialize)]
pub struct ElementSnapshot {
    pub tag: String,
    pub id: String,
    pub class: String,
    pub attributes: BTreeMap<String, String>,
    /// Index of the parent element, `None` for the root
    pub parent: Option<usize>,
    pub children: Vec<ChildNode>,
}

/// Parsed page content as seen by the script context and the rasterizer
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub title: String,
    /// Explicit page background from `<body bgcolor>` or an inline style
    pub background: Option<(u8, u8, u8)>,
    pub elements: Vec<ElementSnapshot>,
    /// Bodies of inline `<script>` elements, in document order
    pub scripts: Vec<String>,
    source: String,
}

impl Document {
    pub fn parse(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = select_first(&document, "title")
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();

        let background = select_first(&document, "body").and_then(body_background);

        Self {
            url: url.to_string(),
            title,
            background,
            elements: flatten_elements(&document),
            scripts: inline_scripts(&document),
            source: html.to_string(),
        }
    }

    /// Re-parse the source for consumers that need the full tree.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.source)
    }
}

fn select_first<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(css).ok()?;
    document.select(&sel).next()
}

// Elements in document order (preorder), parents before children.
fn flatten_elements(document: &Html) -> Vec<ElementSnapshot> {
    let ordered: Vec<ElementRef> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();
    let index: HashMap<_, usize> = ordered.iter().enumerate().map(|(i, el)| (el.id(), i)).collect();

    ordered
        .iter()
        .map(|node| {
            let value = node.value();
            let children = node
                .children()
                .filter_map(|child| match ElementRef::wrap(child) {
                    Some(el) => index.get(&el.id()).map(|&i| ChildNode::Element(i)),
                    None => child.value().as_text().map(|t| ChildNode::Text(t.to_string())),
                })
                .collect();
            ElementSnapshot {
                tag: value.name().to_string(),
                id: value.attr("id").unwrap_or_default().to_string(),
                class: value.attr("class").unwrap_or_default().to_string(),
                attributes: value
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                parent: node
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|p| index.get(&p.id()).copied()),
                children,
            }
        })
        .collect()
}

// External scripts (`src=`) are never fetched.
fn inline_scripts(document: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("script:not([src])") else {
        return Vec::new();
    };
    document
        .select(&sel)
        .filter(|s| match s.value().attr("type") {
            None => true,
            Some(t) => matches!(t.trim().to_ascii_lowercase().as_str(), "" | "text/javascript" | "application/javascript"),
        })
        .map(|s| s.text().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn body_background(body: ElementRef) -> Option<(u8, u8, u8)> {
    if let Some(c) = body.value().attr("bgcolor").and_then(parse_color) {
        return Some(c);
    }
    let style = body.value().attr("style")?;
    style.split(';').find_map(|decl| {
        let (prop, value) = decl.split_once(':')?;
        match prop.trim().to_ascii_lowercase().as_str() {
            "background" | "background-color" => value.split_whitespace().find_map(parse_color),
            _ => None,
        }
    })
}

/// Parse `#rgb`, `#rrggbb` or a handful of named colours.
pub fn parse_color(value: &str) -> Option<(u8, u8, u8)> {
    let v = value.trim().to_ascii_lowercase();
    if let Some(hex) = v.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<Vec<_>>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some((r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => Some((r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            _ => None,
        };
    }
    match v.as_str() {
        "white" => Some((255, 255, 255)),
        "black" => Some((0, 0, 0)),
        "red" => Some((255, 0, 0)),
        "green" => Some((0, 128, 0)),
        "blue" => Some((0, 0, 255)),
        "gray" | "grey" => Some((128, 128, 128)),
        "yellow" => Some((255, 255, 0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<html><head><title>RF</title></head><body bgcolor=\"#102030\"><div id=\"hello\" class=\"greeting\">Hello <b>RF</b></div></body></html>";

    #[test]
    fn parse_extracts_title_and_background() {
        let doc = Document::parse("http://local/", PAGE);
        assert_eq!(doc.title, "RF");
        assert_eq!(doc.background, Some((0x10, 0x20, 0x30)));
    }

    #[test]
    fn elements_are_in_document_order_with_parents() {
        let doc = Document::parse("http://local/", PAGE);
        let tags: Vec<_> = doc.elements.iter().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "head", "title", "body", "div", "b"]);

        let div = doc.elements.iter().position(|e| e.id == "hello").expect("div");
        assert_eq!(doc.elements[div].class, "greeting");
        let b = &doc.elements[div + 1];
        assert_eq!(b.parent, Some(div));
        assert_eq!(b.children, vec![ChildNode::Text("RF".into())]);
    }

    #[test]
    fn children_keep_text_and_element_order() {
        let doc = Document::parse("x:", "<body><p>a<i>b</i>c<i>d</i></p></body>");
        let p = doc.elements.iter().position(|e| e.tag == "p").expect("p");
        assert_eq!(
            doc.elements[p].children,
            vec![
                ChildNode::Text("a".into()),
                ChildNode::Element(p + 1),
                ChildNode::Text("c".into()),
                ChildNode::Element(p + 2),
            ]
        );
        // the table holds direct text only
        let json = serde_json::to_string(&doc.elements[p]).unwrap();
        assert!(!json.contains("\"b\"") && !json.contains("\"d\""));
    }

    #[test]
    fn empty_source_still_has_a_body() {
        let doc = Document::parse("about:blank", "");
        let body = doc.elements.iter().find(|e| e.tag == "body").expect("body");
        assert!(body.children.is_empty());
    }

    #[test]
    fn inline_style_background() {
        let doc = Document::parse("x:", "<body style=\"margin:0; background-color: #fff\"></body>");
        assert_eq!(doc.background, Some((255, 255, 255)));
    }

    #[test]
    fn inline_scripts_skip_external_and_data_blocks() {
        let doc = Document::parse(
            "x:",
            "<head><script>var a = 1;</script><script src=\"x.js\"></script></head>\
             <body><script type=\"application/json\">{}</script><script>var b = 2;</script></body>",
        );
        assert_eq!(doc.scripts, vec!["var a = 1;", "var b = 2;"]);
    }

    #[test]
    fn colors() {
        assert_eq!(parse_color("#f00"), Some((255, 0, 0)));
        assert_eq!(parse_color("Blue"), Some((0, 0, 255)));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("rgb(1,2,3)"), None);
    }
}
