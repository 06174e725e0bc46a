//! Branded ID newtypes for type safety.
//!
//! Connection and worker handles are both small integers assigned by the
//! host network server. Wrapping them in distinct newtypes prevents
//! accidentally passing a worker index where a connection fd is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Wrap a raw handle.
            #[must_use]
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            /// Return the raw handle.
            #[must_use]
            pub const fn raw(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// File-descriptor handle for one accepted connection within a worker.
    ///
    /// The default value `0` means "no active binding": context operations
    /// issued outside a connection scope land under fd 0.
    ConnectionId(u64)
}

branded_id! {
    /// Index of one worker process within the server process group.
    WorkerId(usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_connection_id_is_zero() {
        assert_eq!(ConnectionId::default().raw(), 0);
    }

    #[test]
    fn connection_id_roundtrip() {
        let id = ConnectionId::new(42);
        assert_eq!(id.raw(), 42);
        assert_eq!(u64::from(id), 42);
        assert_eq!(ConnectionId::from(42), id);
    }

    #[test]
    fn worker_id_roundtrip() {
        let id = WorkerId::new(3);
        assert_eq!(id.raw(), 3);
        assert_eq!(WorkerId::from(3usize), id);
    }

    #[test]
    fn display_is_raw_integer() {
        assert_eq!(ConnectionId::new(7).to_string(), "7");
        assert_eq!(WorkerId::new(1).to_string(), "1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ConnectionId::new(99);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "99");
        let back: ConnectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn distinct_types_distinct_hashes() {
        use std::collections::HashSet;
        let mut fds = HashSet::new();
        assert!(fds.insert(ConnectionId::new(1)));
        assert!(fds.insert(ConnectionId::new(2)));
        assert!(!fds.insert(ConnectionId::new(1)));
    }
}
