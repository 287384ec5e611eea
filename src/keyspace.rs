//! Key and field naming.
//!
//! Everything here is pure and deterministic. The store key is produced by
//! the injected key function and is shared by every field and every version
//! of one logical key; that is why a single store-level delete evicts all of
//! them at once. Field names carry the configured version (and optionally a
//! type fingerprint), which is the whole version-isolation mechanism.

/// Produces an opaque fingerprint for a caller-supplied type descriptor.
///
/// The engine never inspects the descriptor or the fingerprint structurally;
/// the fingerprint is only appended to field names so that incompatible
/// cache layouts of the same logical cache cannot observe each other.
pub trait TypeFingerprinter: Send + Sync {
  fn fingerprint(&self, descriptor: &str) -> String;
}

/// `"<field>|<version>"`, plus `"|<fingerprint>"` when type isolation is on.
pub(crate) fn field_name(field: &str, version: &str, fingerprint: Option<&str>) -> String {
  match fingerprint {
    Some(fp) => format!("{field}|{version}|{fp}"),
    None => format!("{field}|{version}"),
  }
}

/// Key of the "not-evicted" marker holding the per-field fencing counters.
/// Eviction deletes this key whole, resetting every field's counter and
/// retroactively invalidating any outstanding reservation under the key.
pub(crate) fn counter_key(store_key: &str) -> String {
  format!("{store_key}:~ver")
}

/// Key of the post-eviction cold marker. Its presence, not its value,
/// signals "do not repopulate yet".
pub(crate) fn cold_key(store_key: &str) -> String {
  format!("{store_key}:~cold")
}

/// Key of the per-(key, field) pessimistic mutex.
pub(crate) fn mutex_key(store_key: &str, field_name: &str) -> String {
  format!("{store_key}:~mx:{field_name}")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn field_names_embed_the_version() {
    assert_eq!(field_name("profile", "0001", None), "profile|0001");
    assert_eq!(
      field_name("profile", "0002", Some("a1b2")),
      "profile|0002|a1b2"
    );
  }

  #[test]
  fn derived_keys_are_disjoint() {
    let keys = [
      counter_key("users:42"),
      cold_key("users:42"),
      mutex_key("users:42", "profile|0001"),
    ];
    assert_eq!(
      keys.len(),
      keys.iter().collect::<std::collections::HashSet<_>>().len()
    );
  }
}
