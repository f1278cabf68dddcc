//! Immutable point-in-time views of a location

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::location::Location;
use crate::value::{get_path, is_absent, split_path, TreeValue};

/// An immutable (location, value) pair.
///
/// Snapshots are never mutated after construction. The patch engine produces
/// new snapshots and hands them out behind an `Arc`, so observers can hold on
/// to old ones for as long as they like.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    location: Location,
    value: TreeValue,
}

impl Snapshot {
    /// Create a snapshot holding `value` at `location`
    pub fn new(location: Location, value: TreeValue) -> Self {
        Self { location, value }
    }

    /// A snapshot of a location with nothing stored at it
    pub fn empty(location: Location) -> Self {
        Self::new(location, TreeValue::Null)
    }

    /// The location this snapshot describes
    pub fn location(&self) -> &Location {
        &self.location
    }

    /// The value stored at the location
    pub fn value(&self) -> &TreeValue {
        &self.value
    }

    /// Last segment of the location, `None` at the root
    pub fn key(&self) -> Option<&str> {
        self.location.key()
    }

    /// Whether anything is stored at the location
    pub fn exists(&self) -> bool {
        !is_absent(&self.value)
    }

    /// Snapshot of a descendant at a relative slash-delimited path
    pub fn child(&self, path: &str) -> Snapshot {
        let value = get_path(&self.value, &split_path(path))
            .cloned()
            .unwrap_or(TreeValue::Null);
        Snapshot::new(self.location.child(path), value)
    }

    /// Whether a descendant exists at `path`
    pub fn has_child(&self, path: &str) -> bool {
        get_path(&self.value, &split_path(path)).is_some_and(|v| !is_absent(v))
    }

    /// Number of direct children (zero for scalars and absent values)
    pub fn children_count(&self) -> usize {
        match &self.value {
            TreeValue::Object(map) => map.values().filter(|v| !is_absent(v)).count(),
            TreeValue::Array(items) => items.iter().filter(|v| !is_absent(v)).count(),
            _ => 0,
        }
    }

    /// Deserialize the value into a typed structure
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn location() -> Location {
        Location::parse("https://db.example.com/rooms").unwrap()
    }

    #[test]
    fn test_child_snapshot() {
        let snap = Snapshot::new(location(), json!({"lobby": {"topic": "hello", "size": 3}}));
        let child = snap.child("lobby/topic");
        assert_eq!(child.value(), &json!("hello"));
        assert_eq!(child.location().path(), "/rooms/lobby/topic");
        assert_eq!(child.key(), Some("topic"));

        let missing = snap.child("attic");
        assert!(!missing.exists());
        assert!(snap.has_child("lobby/size"));
        assert!(!snap.has_child("lobby/owner"));
    }

    #[test]
    fn test_children_count() {
        let snap = Snapshot::new(location(), json!({"a": 1, "b": null, "c": {}}));
        assert_eq!(snap.children_count(), 1);
        assert_eq!(Snapshot::empty(location()).children_count(), 0);
    }

    #[test]
    fn test_deserialize() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Room {
            topic: String,
            size: u32,
        }

        let snap = Snapshot::new(location(), json!({"topic": "hello", "size": 3}));
        let room: Room = snap.deserialize().unwrap();
        assert_eq!(
            room,
            Room {
                topic: "hello".into(),
                size: 3
            }
        );
    }
}
