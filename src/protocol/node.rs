use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 節點屬性或單值 payload 的型別化純量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    Int(i32),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// 線上傳輸的文字形式，浮點數固定六位小數
    pub fn render(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => format!("{:.6}", v),
            Scalar::Text(v) => v.clone(),
        }
    }

    /// 服務端回傳的屬性多半是文字，這裡同時接受 Int 與可解析的 Text
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Scalar::Int(v) => Some(*v),
            Scalar::Text(v) => v.trim().parse().ok(),
            Scalar::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Scalar(Scalar),
    IntArray(Vec<i32>),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            Payload::IntArray(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Payload::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// 協議中的樹狀訊息節點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, Scalar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Payload>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            payload: None,
        }
    }

    pub fn binary(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name).with_payload(Payload::Binary(bytes))
    }

    pub fn value(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self::new(name).with_payload(Payload::Scalar(value.into()))
    }

    pub fn array(name: impl Into<String>, values: Vec<i32>) -> Self {
        Self::new(name).with_payload(Payload::IntArray(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Scalar> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Scalar> {
        &self.attributes
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.add_child(child);
        self
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// 所有同名子節點（依原順序），用於列舉重複的資料列
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// 相對路徑的第一個符合子節點，例如 `IIDX23pc/pcdata`
    pub fn child(&self, relative_path: &str) -> Option<&Node> {
        relative_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |node, segment| {
                node.children.iter().find(|child| child.name == segment)
            })
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = Some(payload);
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.set_payload(payload);
        self
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }
}
