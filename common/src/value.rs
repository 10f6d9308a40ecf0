use serde::{Deserialize, Serialize};

/// A decoded reply from the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Nil,
    Int(i64),
    /// Simple or bulk string
    Str(String),
    Array(Vec<Value>),
}

impl Value {
    /// Text form of scalar replies. Integers render as decimal.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }

    /// Integer form of scalar replies, parsing numeric strings.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Element `idx` of an array reply
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.as_array().and_then(|items| items.get(idx))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_coercions() {
        assert_eq!(Value::Int(7).as_text().as_deref(), Some("7"));
        assert_eq!(Value::from("6379").as_int(), Some(6379));
        assert_eq!(Value::from("abc").as_int(), None);
        assert_eq!(Value::Nil.as_text(), None);
    }

    #[test]
    fn test_array_access() {
        let v = Value::from(vec![Value::from("master"), Value::Int(3)]);
        assert_eq!(v.get(1), Some(&Value::Int(3)));
        assert_eq!(v.get(2), None);
        assert_eq!(Value::Int(1).get(0), None);
    }
}
