use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every gateway instance id.
const INSTANCE_PREFIX: &str = "frontend-rust-";

/// Identifies one running gateway process.
///
/// Used as the prefix of every [`RequestId`] the instance allocates and as
/// the container id of its broker connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Creates a random instance id of the form `frontend-rust-xxxx`.
    #[must_use]
    pub fn generate() -> Self {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(4).collect();
        Self(format!("{INSTANCE_PREFIX}{suffix}"))
    }

    /// Creates an `InstanceId` from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a single work request: `<instance id>/<sequence>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Builds the id for the given sequence number within an instance.
    #[must_use]
    pub fn new(instance: &InstanceId, sequence: u64) -> Self {
        Self(format!("{instance}/{sequence}"))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the sequence component, if the id has one.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        let (_, seq) = self.0.rsplit_once('/')?;
        seq.parse().ok()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RequestId> for String {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Returns the part of a worker id after its final `-`.
///
/// `cluster-a-0001` becomes `0001`. An id without a `-` is returned whole.
#[must_use]
pub fn short_worker_id(worker_id: &str) -> &str {
    match worker_id.rfind('-') {
        Some(pos) => &worker_id[pos + 1..],
        None => worker_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_generate_has_prefix_and_four_char_suffix() {
        let id = InstanceId::generate();
        let suffix = id
            .as_str()
            .strip_prefix(INSTANCE_PREFIX)
            .unwrap_or_else(|| panic!("missing prefix in {id}"));
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn request_id_formats_instance_and_sequence() {
        let id = RequestId::new(&InstanceId::new("frontend-rust-ab12"), 7);
        assert_eq!(id.as_str(), "frontend-rust-ab12/7");
        assert_eq!(id.sequence(), Some(7));
    }

    #[test]
    fn short_worker_id_takes_suffix_after_last_dash() {
        assert_eq!(short_worker_id("cluster-a-0001"), "0001");
        assert_eq!(short_worker_id("worker-"), "");
        assert_eq!(short_worker_id("solo"), "solo");
    }

    proptest::proptest! {
        #[test]
        fn proptest_short_worker_id_never_contains_dash(id in ".*") {
            let short = short_worker_id(&id);
            proptest::prop_assert!(!short.contains('-'));
            proptest::prop_assert!(id.ends_with(short));
        }
    }
}
