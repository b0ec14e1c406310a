//! Items exchanged between connectors and components.
//!
//! A deliberately small tree model: documents, elements, text and comments,
//! plus atomic strings and raw binary values. Components built on a real XML
//! engine convert at their boundary.

use bytes::Bytes;

use crate::model::qname::QName;

/// Ordered sequence of items, the unit every component consumes and produces.
pub type Sequence = Vec<Item>;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Document(Vec<Node>),
    Node(Node),
    Atomic(String),
    Binary(Bytes),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Add an attribute in no namespace.
    pub fn with_attr(mut self, local: &str, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: QName::local(local),
            value: value.into(),
        });
        self
    }

    pub fn with_qualified_attr(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name,
            value: value.into(),
        });
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Value of the unqualified attribute `local`.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| !a.name.has_namespace() && a.name.local == local)
            .map(|a| a.value.as_str())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn string_value(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Element(e) => collect_text(&e.children, out),
            Node::Text(t) => out.push_str(t),
            Node::Comment(_) => {}
        }
    }
}

impl Item {
    pub fn element(element: Element) -> Self {
        Item::Node(Node::Element(element))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Item::Atomic(value.into())
    }

    /// The element this item denotes: an element node, or a document whose
    /// only non-whitespace child is an element.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Item::Node(Node::Element(e)) => Some(e),
            Item::Document(children) => {
                let mut elements = children.iter().filter(|n| match n {
                    Node::Text(t) => !t.trim().is_empty(),
                    Node::Comment(_) => false,
                    Node::Element(_) => true,
                });
                match (elements.next(), elements.next()) {
                    (Some(Node::Element(e)), None) => Some(e),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn is_document_or_element(&self) -> bool {
        matches!(self, Item::Document(_) | Item::Node(Node::Element(_)))
    }

    pub fn string_value(&self) -> String {
        match self {
            Item::Document(children) => {
                let mut out = String::new();
                collect_text(children, &mut out);
                out
            }
            Item::Node(Node::Element(e)) => e.string_value(),
            Item::Node(Node::Text(t)) | Item::Node(Node::Comment(t)) => t.clone(),
            Item::Atomic(s) => s.clone(),
            Item::Binary(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_with_single_element() {
        let doc = Item::Document(vec![
            Node::Comment("c".into()),
            Node::Text("\n  ".into()),
            Node::Element(Element::new(QName::local("root"))),
        ]);
        assert_eq!(doc.as_element().map(|e| e.name.local.as_str()), Some("root"));
    }

    #[test]
    fn test_document_with_two_elements_is_not_an_element() {
        let doc = Item::Document(vec![
            Node::Element(Element::new(QName::local("a"))),
            Node::Element(Element::new(QName::local("b"))),
        ]);
        assert!(doc.as_element().is_none());
    }

    #[test]
    fn test_string_value_concatenates_descendants() {
        let e = Element::new(QName::local("p"))
            .with_text("a")
            .with_child(Element::new(QName::local("b")).with_text("b"))
            .with_text("c");
        assert_eq!(e.string_value(), "abc");
    }
}
