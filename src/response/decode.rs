//! Decoding of `web:response` result sequences.
//!
//! ```text
//! response[status, message?]
//!   header[name, value]*
//!   ( body[...] | multipart[content-type, boundary] body[...]+ )?
//! ```
//!
//! Bodies without inline content or `src` take the next trailing item of
//! the result sequence, left to right.

use std::collections::VecDeque;

use crate::error::TransportError;
use crate::model::item::{Element, Item, Node, Sequence};
use crate::model::WEB_NS;
use crate::response::serialize::SerializationParams;

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseDescriptor {
    pub status: u16,
    pub message: Option<String>,
    /// Document order, duplicates kept.
    pub headers: Vec<(String, String)>,
    pub content: ResponseContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    Empty,
    Single(Body),
    Multipart(Multipart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Multipart {
    pub content_type: Option<String>,
    pub boundary: Option<String>,
    pub bodies: Vec<Body>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub id: Option<String>,
    pub description: Option<String>,
    pub params: SerializationParams,
    pub content: BodyContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BodyContent {
    /// Inline children or one trailing item, to be serialized.
    Items(Sequence),
    /// `src` URI, streamed verbatim.
    External(String),
}

fn internal(message: impl Into<String>) -> TransportError {
    TransportError::internal(message)
}

fn is_web(element: &Element, local: &str) -> bool {
    element.name.namespace == WEB_NS && element.name.local == local
}

impl ResponseDescriptor {
    pub fn decode(items: Sequence) -> Result<Self, TransportError> {
        let mut items = items.into_iter();
        let first = items
            .next()
            .ok_or_else(|| internal("The result sequence is empty, expected a web:response"))?;
        let element = first.as_element().ok_or_else(|| {
            internal("The first item of the result must be a web:response element")
        })?;
        if !is_web(element, "response") {
            return Err(internal(format!(
                "The first item of the result must be a web:response element, got {}",
                element.name
            )));
        }
        let mut trailing: VecDeque<Item> = items.collect();

        let mut status = 200;
        let mut message = None;
        for attr in &element.attributes {
            if attr.name.has_namespace() {
                continue;
            }
            match attr.name.local.as_str() {
                "status" => {
                    status = attr
                        .value
                        .trim()
                        .parse::<u16>()
                        .ok()
                        .filter(|s| (100..=999).contains(s))
                        .ok_or_else(|| {
                            internal(format!("Invalid web:response/@status: {:?}", attr.value))
                        })?;
                }
                "message" => message = Some(attr.value.clone()),
                other => {
                    return Err(internal(format!(
                        "Unknown attribute on web:response: {}",
                        other
                    )))
                }
            }
        }

        let mut headers = Vec::new();
        let mut content = ResponseContent::Empty;
        for child in &element.children {
            let child = match child {
                Node::Element(e) => e,
                Node::Comment(_) => continue,
                Node::Text(t) if t.trim().is_empty() => continue,
                Node::Text(_) => return Err(internal("Text content is not allowed in web:response")),
            };
            if child.name.namespace != WEB_NS {
                return Err(internal(format!("Unknown element in web:response: {}", child.name)));
            }
            match child.name.local.as_str() {
                "header" => headers.push(decode_header(child)?),
                "body" | "multipart" if content != ResponseContent::Empty => {
                    return Err(internal(
                        "web:response contains more than one body or multipart",
                    ))
                }
                "body" => content = ResponseContent::Single(decode_body(child, &mut trailing)?),
                "multipart" => {
                    content = ResponseContent::Multipart(decode_multipart(child, &mut trailing)?)
                }
                other => {
                    return Err(internal(format!(
                        "Unknown element in web:response: web:{}",
                        other
                    )))
                }
            }
        }

        if !trailing.is_empty() {
            tracing::warn!(
                count = trailing.len(),
                "Result items not consumed by any web:body"
            );
        }

        Ok(Self {
            status,
            message,
            headers,
            content,
        })
    }
}

fn decode_header(element: &Element) -> Result<(String, String), TransportError> {
    let mut name = None;
    let mut value = None;
    for attr in &element.attributes {
        if attr.name.has_namespace() {
            continue;
        }
        match attr.name.local.as_str() {
            "name" => name = Some(attr.value.clone()),
            "value" => value = Some(attr.value.clone()),
            other => return Err(internal(format!("Unknown attribute on web:header: {}", other))),
        }
    }
    match (name, value) {
        (Some(name), Some(value)) => Ok((name, value)),
        _ => Err(internal("web:header requires both name and value")),
    }
}

fn decode_multipart(
    element: &Element,
    trailing: &mut VecDeque<Item>,
) -> Result<Multipart, TransportError> {
    let mut multipart = Multipart {
        content_type: None,
        boundary: None,
        bodies: Vec::new(),
    };
    for attr in &element.attributes {
        if attr.name.has_namespace() {
            continue;
        }
        match attr.name.local.as_str() {
            "content-type" => multipart.content_type = Some(attr.value.clone()),
            "boundary" => multipart.boundary = Some(attr.value.clone()),
            other => {
                return Err(internal(format!(
                    "Unknown attribute on web:multipart: {}",
                    other
                )))
            }
        }
    }
    for child in element.child_elements() {
        if is_web(child, "body") {
            multipart.bodies.push(decode_body(child, trailing)?);
        } else if is_web(child, "header") {
            return Err(TransportError::not_implemented(
                "Headers on multipart parts are not supported",
            ));
        } else {
            return Err(internal(format!("Unknown element in web:multipart: {}", child.name)));
        }
    }
    if multipart.bodies.is_empty() {
        return Err(internal("web:multipart requires at least one web:body"));
    }
    Ok(multipart)
}

fn decode_body(element: &Element, trailing: &mut VecDeque<Item>) -> Result<Body, TransportError> {
    let mut id = None;
    let mut description = None;
    let mut src = None;
    let mut params = SerializationParams::default();

    for attr in &element.attributes {
        if attr.name.has_namespace() {
            continue;
        }
        let value = attr.value.clone();
        match attr.name.local.as_str() {
            "id" => id = Some(value),
            "description" => description = Some(value),
            "src" => src = Some(value),
            name => {
                if !params.set(name, &value)? {
                    return Err(internal(format!("Unknown attribute on web:body: {}", name)));
                }
            }
        }
    }

    let inline: Sequence = element.children.iter().cloned().map(Item::Node).collect();
    let content = match src {
        Some(_) if !inline.is_empty() => {
            return Err(internal("web:body cannot have both inline content and @src"))
        }
        Some(src) => BodyContent::External(src),
        None if !inline.is_empty() => BodyContent::Items(inline),
        None => {
            let item = trailing
                .pop_front()
                .ok_or_else(|| internal("Not enough bodies in the result sequence"))?;
            BodyContent::Items(vec![item])
        }
    };

    Ok(Body {
        id,
        description,
        params,
        content,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QName;

    fn web(local: &str) -> Element {
        Element::new(QName::new(WEB_NS, local).with_prefix("web"))
    }

    #[test]
    fn test_minimal_response() {
        let descriptor = ResponseDescriptor::decode(vec![Item::element(
            web("response").with_attr("status", "204"),
        )])
        .unwrap();
        assert_eq!(descriptor.status, 204);
        assert_eq!(descriptor.content, ResponseContent::Empty);
    }

    #[test]
    fn test_document_wrapper_and_default_status() {
        let doc = Item::Document(vec![Node::Element(web("response"))]);
        assert_eq!(ResponseDescriptor::decode(vec![doc]).unwrap().status, 200);
    }

    #[test]
    fn test_first_item_must_be_response() {
        let err = ResponseDescriptor::decode(vec![Item::text("hello")]).unwrap_err();
        assert_eq!(err.status, 500);
        let err = ResponseDescriptor::decode(vec![Item::element(web("request"))]).unwrap_err();
        assert!(err.message.contains("web:response"));
    }

    #[test]
    fn test_headers_keep_duplicates_in_order() {
        let response = web("response")
            .with_child(web("header").with_attr("name", "Set-Cookie").with_attr("value", "a=1"))
            .with_child(web("header").with_attr("name", "Set-Cookie").with_attr("value", "b=2"));
        let descriptor = ResponseDescriptor::decode(vec![Item::element(response)]).unwrap();
        assert_eq!(
            descriptor.headers,
            vec![
                ("Set-Cookie".to_string(), "a=1".to_string()),
                ("Set-Cookie".to_string(), "b=2".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_attribute_rejected_foreign_ignored() {
        let bad = web("response").with_attr("stauts", "200");
        let err = ResponseDescriptor::decode(vec![Item::element(bad)]).unwrap_err();
        assert!(err.message.contains("stauts"));

        let foreign = web("response").with_qualified_attr(QName::new("urn:x", "note"), "ok");
        assert!(ResponseDescriptor::decode(vec![Item::element(foreign)]).is_ok());
    }

    #[test]
    fn test_bodies_consume_trailing_items() {
        let response = web("response").with_child(web("body").with_attr("content-type", "text/plain"));
        let descriptor = ResponseDescriptor::decode(vec![
            Item::element(response),
            Item::text("payload"),
        ])
        .unwrap();
        match descriptor.content {
            ResponseContent::Single(body) => {
                assert_eq!(body.content, BodyContent::Items(vec![Item::text("payload")]));
                assert_eq!(body.params.media_type.as_deref(), Some("text/plain"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_enough_bodies() {
        let response = web("response").with_child(
            web("multipart")
                .with_child(web("body"))
                .with_child(web("body")),
        );
        let err = ResponseDescriptor::decode(vec![Item::element(response), Item::text("one")])
            .unwrap_err();
        assert_eq!(err.message, "Not enough bodies in the result sequence");
    }

    #[test]
    fn test_multipart_header_not_implemented() {
        let response = web("response").with_child(
            web("multipart").with_child(web("header").with_attr("name", "a").with_attr("value", "b")),
        );
        let err = ResponseDescriptor::decode(vec![Item::element(response)]).unwrap_err();
        assert_eq!(err.status, 501);
    }

    #[test]
    fn test_src_and_inline_conflict() {
        let response = web("response").with_child(
            web("body").with_attr("src", "a.txt").with_text("inline"),
        );
        assert!(ResponseDescriptor::decode(vec![Item::element(response)]).is_err());
    }

    #[test]
    fn test_two_bodies_rejected() {
        let response = web("response").with_child(web("body").with_text("a")).with_child(web("body").with_text("b"));
        assert!(ResponseDescriptor::decode(vec![Item::element(response)]).is_err());
    }
}
