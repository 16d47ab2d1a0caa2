//! Context module: how the matcher reads fields out of candidate documents.
//!
//! The storage/scan layer hands the matcher anything implementing [`FieldAccessor`]. An absent
//! field is reported as `None`, never as a zero or null value.

use crate::types::{Document, Value};
use std::collections::HashMap;

pub trait FieldAccessor {
    /// Look up a (possibly dotted) field path.
    fn field(&self, path: &str) -> Option<&Value>;
}

impl FieldAccessor for Document {
    fn field(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_document()?.get(segment)?;
        }
        Some(current)
    }
}

impl FieldAccessor for HashMap<String, Value> {
    fn field(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.get(path) {
            return Some(v);
        }
        let (head, rest) = path.split_once('.')?;
        self.get(head)?.as_document()?.field(rest)
    }
}

impl<T: FieldAccessor + ?Sized> FieldAccessor for &T {
    fn field(&self, path: &str) -> Option<&Value> {
        (**self).field(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_top_level_lookup() {
        let d = doc! { "a" => 54, "b" => "x" };
        assert_eq!(d.field("a"), Some(&Value::Int(54)));
        assert_eq!(d.field("missing"), None);
    }

    #[test]
    fn test_dotted_path_lookup() {
        let d = doc! { "a" => doc! { "b" => doc! { "c" => 7 } } };
        assert_eq!(d.field("a.b.c"), Some(&Value::Int(7)));
        assert_eq!(d.field("a.x.c"), None);
        // Paths do not descend through scalars.
        let d = doc! { "a" => 1 };
        assert_eq!(d.field("a.b"), None);
    }

    #[test]
    fn test_array_is_not_traversed() {
        let d = doc! { "a" => vec![doc! { "b" => 1 }] };
        assert_eq!(d.field("a.b"), None);
    }

    #[test]
    fn test_hash_map_accessor() {
        let mut m = HashMap::new();
        m.insert("flags".to_string(), Value::Int(3));
        m.insert("meta".to_string(), Value::Document(doc! { "mode" => 5 }));
        assert_eq!(m.field("flags"), Some(&Value::Int(3)));
        assert_eq!(m.field("meta.mode"), Some(&Value::Int(5)));
        assert_eq!(m.field("nope"), None);
    }
}
