//! Values stored in a PHP config array.

use std::fmt;

/// A config value.
///
/// Arrays whose keys are `0..n` in order are lists; any other array is a
/// keyed map that keeps its declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `NULL`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// Quoted string
    Str(String),
    /// `array ( 0 => ..., 1 => ... )`
    List(Vec<Value>),
    /// `array ( 'key' => ..., )`
    Map(Vec<(String, Value)>),
}

impl Value {
    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar rendered as plain text, as PHP would cast it to string
    ///
    /// Arrays have no scalar form.
    pub fn to_plain_string(&self) -> Option<String> {
        match self {
            Self::Null => Some(String::new()),
            Self::Bool(true) => Some("1".to_string()),
            Self::Bool(false) => Some(String::new()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Str(s) => Some(s.clone()),
            Self::List(_) | Self::Map(_) => None,
        }
    }

    /// Build an array from explicitly keyed pairs
    ///
    /// Keys `"0".."n"` in order give a list, so the result compares equal to
    /// what the same array reads back as once written.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Self::from_entries(pairs.into_iter().map(|(k, v)| (Some(k), v)).collect())
    }

    /// Build an array value from parsed `(key, value)` entries
    ///
    /// Entries without an explicit key get the next integer index, like PHP.
    /// A repeated key keeps its first position and takes the last value.
    pub(crate) fn from_entries(entries: Vec<(Option<String>, Value)>) -> Self {
        let mut next_index: i64 = 0;
        let mut keyed: Vec<(String, Value)> = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            let key = match key {
                Some(k) => k,
                None => next_index.to_string(),
            };
            if let Ok(index) = key.parse::<i64>() {
                next_index = next_index.max(index.saturating_add(1));
            }
            match keyed.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => keyed.push((key, value)),
            }
        }

        let sequential = keyed
            .iter()
            .enumerate()
            .all(|(position, (key, _))| *key == position.to_string());
        if sequential {
            Self::List(keyed.into_iter().map(|(_, v)| v).collect())
        } else {
            Self::Map(keyed)
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::render_value(self, 0))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_entries_become_list() {
        let value = Value::from_entries(vec![
            (None, Value::from("localhost")),
            (Some("1".into()), Value::from("cloud.example.com")),
        ]);
        assert_eq!(
            value,
            Value::List(vec!["localhost".into(), "cloud.example.com".into()])
        );
    }

    #[test]
    fn named_entries_become_map() {
        let value = Value::from_entries(vec![
            (Some("path".into()), Value::from("/var/www/owncloud/apps")),
            (Some("writable".into()), Value::from(false)),
        ]);
        assert!(matches!(value, Value::Map(ref entries) if entries.len() == 2));
    }

    #[test]
    fn sparse_indexes_become_map() {
        let value = Value::from_entries(vec![
            (Some("3".into()), Value::from("a")),
            (None, Value::from("b")),
        ]);
        assert_eq!(
            value,
            Value::Map(vec![("3".into(), "a".into()), ("4".into(), "b".into())])
        );
    }

    #[test]
    fn repeated_key_keeps_first_slot_and_last_value() {
        let value = Value::from_entries(vec![
            (Some("dbhost".into()), Value::from("old")),
            (Some("dbname".into()), Value::from("owncloud")),
            (Some("dbhost".into()), Value::from("live")),
        ]);
        assert_eq!(
            value,
            Value::Map(vec![
                ("dbhost".into(), "live".into()),
                ("dbname".into(), "owncloud".into()),
            ])
        );
    }

    #[test]
    fn repeated_index_can_still_form_list() {
        let value = Value::from_entries(vec![
            (None, Value::from("a")),
            (Some("0".into()), Value::from("b")),
            (None, Value::from("c")),
        ]);
        assert_eq!(value, Value::List(vec!["b".into(), "c".into()]));
    }

    #[test]
    fn largest_index_does_not_overflow() {
        let value = Value::from_entries(vec![
            (Some(i64::MAX.to_string()), Value::from("x")),
            (None, Value::from("y")),
        ]);
        // Appending past the largest index lands on the saturated key.
        assert_eq!(
            value,
            Value::Map(vec![(i64::MAX.to_string(), "y".into())])
        );
    }

    #[test]
    fn keyed_pairs_in_index_order_become_list() {
        let value = Value::from_pairs(vec![
            ("0".into(), Value::from("a")),
            ("1".into(), Value::from("b")),
        ]);
        assert_eq!(value, Value::List(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn plain_string_follows_php_casts() {
        assert_eq!(Value::Bool(true).to_plain_string().as_deref(), Some("1"));
        assert_eq!(Value::Int(42).to_plain_string().as_deref(), Some("42"));
        assert_eq!(Value::List(vec![]).to_plain_string(), None);
    }
}
