/// Macro to create a strongly-typed newtype wrapper around a primitive id.
///
/// The generated type is `Copy`, ordered, hashable, and serializes
/// transparently as its inner value. `Display` prints the raw value;
/// `Debug` prints `Name(value)`.
#[macro_export]
macro_rules! strong_type {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            Default,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(val: $inner) -> Self {
                Self(val)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(val: $name) -> Self {
                val.0
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    strong_type!(TestId, u64);

    #[test]
    fn test_strong_type_basic() {
        let id = TestId(42);
        assert_eq!(id.0, 42);
    }

    #[test]
    fn test_strong_type_from() {
        let id: TestId = 100u64.into();
        assert_eq!(id.0, 100);

        let raw: u64 = id.into();
        assert_eq!(raw, 100);
    }

    #[test]
    fn test_strong_type_display_debug() {
        let id = TestId(7);
        assert_eq!(format!("{}", id), "7");
        assert_eq!(format!("{:?}", id), "TestId(7)");
    }

    #[test]
    fn test_strong_type_ord_in_set() {
        let mut set = BTreeSet::new();
        set.insert(TestId(9));
        set.insert(TestId(3));
        set.insert(TestId(9));
        let collected: Vec<_> = set.into_iter().collect();
        assert_eq!(collected, vec![TestId(3), TestId(9)]);
    }

    #[test]
    fn test_strong_type_serde() {
        let id = TestId(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let parsed: TestId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
