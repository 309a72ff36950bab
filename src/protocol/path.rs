//! 以斜線分隔的路徑查詢，例如 `response/IIDX23shop/@opname`。
//!
//! 第一段必須是根節點本身的名稱，其後每一段選取該層第一個同名子節點。
//! 結尾可接 `@attr` 選取最後節點的屬性。

use crate::protocol::node::{Node, Payload, Scalar};
use crate::utils::error::{Result, VerifyError};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    segments: Vec<String>,
    attribute: Option<String>,
}

impl NodePath {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = |reason: &str| VerifyError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = path.split('/').collect();
        let mut segments = Vec::with_capacity(parts.len());
        let mut attribute = None;

        for (index, part) in parts.iter().enumerate() {
            if part.is_empty() {
                return Err(invalid("empty path segment"));
            }
            if let Some(name) = part.strip_prefix('@') {
                if index != parts.len() - 1 {
                    return Err(invalid("attribute selector must be the last segment"));
                }
                if name.is_empty() {
                    return Err(invalid("empty attribute name"));
                }
                attribute = Some(name.to_string());
            } else {
                segments.push(part.to_string());
            }
        }

        if segments.is_empty() {
            return Err(invalid("path must name at least the root node"));
        }

        Ok(Self {
            segments,
            attribute,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    fn locate<'a>(&self, root: &'a Node) -> Option<&'a Node> {
        let (first, rest) = self.segments.split_first()?;
        if root.name() != first {
            return None;
        }
        rest.iter().try_fold(root, |node, segment| {
            node.children().iter().find(|child| child.name() == segment)
        })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))?;
        if let Some(attribute) = &self.attribute {
            write!(f, "/@{}", attribute)?;
        }
        Ok(())
    }
}

/// 路徑解析結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolved<'a> {
    Node(&'a Node),
    Attribute(&'a Scalar),
}

impl<'a> Resolved<'a> {
    pub fn as_node(&self) -> Option<&'a Node> {
        match self {
            Resolved::Node(node) => Some(node),
            Resolved::Attribute(_) => None,
        }
    }

    pub fn as_attribute(&self) -> Option<&'a Scalar> {
        match self {
            Resolved::Attribute(value) => Some(value),
            Resolved::Node(_) => None,
        }
    }
}

fn not_found(path: &str) -> VerifyError {
    VerifyError::PathNotFound {
        path: path.to_string(),
    }
}

pub fn resolve_path<'a>(root: &'a Node, path: &str) -> Result<Resolved<'a>> {
    let parsed = NodePath::parse(path)?;
    let node = parsed.locate(root).ok_or_else(|| not_found(path))?;

    match parsed.attribute() {
        Some(attribute) => node
            .attribute(attribute)
            .map(Resolved::Attribute)
            .ok_or_else(|| not_found(path)),
        None => Ok(Resolved::Node(node)),
    }
}

pub fn assert_path(root: &Node, path: &str) -> Result<()> {
    resolve_path(root, path).map(|_| ())
}

/// 取得最後節點的 payload；節點存在但沒有 payload 也視為找不到
pub fn child_value<'a>(root: &'a Node, path: &str) -> Result<&'a Payload> {
    let parsed = NodePath::parse(path)?;
    if parsed.attribute().is_some() {
        return Err(VerifyError::InvalidPath {
            path: path.to_string(),
            reason: "payload lookup cannot end in an attribute selector".to_string(),
        });
    }
    parsed
        .locate(root)
        .and_then(Node::payload)
        .ok_or_else(|| not_found(path))
}
