use crate::comment::ProvisionalId;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};

const PROVISIONAL_PREFIX: &str = "tmp";

/// Issues provisional ids that are unique within one client session.
///
/// Each id combines a millisecond clock reading, a per-generator sequence and a
/// random salt fixed at construction, e.g. `tmp-1760601600000-3-9f1c2a7b`. The
/// sequence alone already guarantees uniqueness per generator; the clock and
/// salt keep ids from two generators (or two sessions) apart.
#[derive(Debug)]
pub struct IdGenerator {
    seq: AtomicU64,
    salt: String,
}

impl IdGenerator {
    pub fn new() -> Self {
        let salt = uuid::Uuid::new_v4().simple().to_string();
        Self::with_salt(&salt[..8])
    }

    pub fn with_salt(salt: &str) -> Self {
        Self {
            seq: AtomicU64::new(0),
            salt: salt.to_string(),
        }
    }

    pub fn next_id(&self) -> ProvisionalId {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        ProvisionalId::new(format!(
            "{PROVISIONAL_PREFIX}-{}-{seq}-{}",
            Utc::now().timestamp_millis(),
            self.salt
        ))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_never_numeric() {
        let ids = IdGenerator::new();
        let issued: HashSet<_> = (0..1_000).map(|_| ids.next_id()).collect();
        assert_eq!(issued.len(), 1_000);
        assert!(
            issued
                .iter()
                .all(|id| id.as_str().starts_with("tmp-") && id.as_str().parse::<i64>().is_err())
        );
    }

    #[test]
    fn salt_is_embedded() {
        let ids = IdGenerator::with_salt("feed");
        assert!(ids.next_id().as_str().ends_with("-0-feed"));
        assert!(ids.next_id().as_str().ends_with("-1-feed"));
    }
}
