//! Cache key resolution.
//!
//! A unit's cache lives under exactly one key at a time: the inspection key
//! once the remote store has assigned an inspection id, the unit key before
//! that (and for anything recorded fully offline). The key is an explicit
//! value object threaded through every cache operation so the read and write
//! paths can never derive different names for the same data.

/// Canonical storage key pair for one unit's item list and its
/// pending-delete set. Pure data, no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
  /// Keyed by a server-assigned inspection id
  Inspection { inspection_id: String },
  /// Keyed by the unit while no inspection id is known
  Unit { unit_id: String },
}

impl CacheKey {
  /// Resolve the canonical key for the given identity state.
  ///
  /// Stable for the lifetime of an inspection id; changes only when the id
  /// transitions from unset to set.
  pub fn resolve(inspection_id: Option<&str>, unit_id: &str) -> Self {
    match inspection_id {
      Some(id) => CacheKey::Inspection {
        inspection_id: id.to_string(),
      },
      None => CacheKey::Unit {
        unit_id: unit_id.to_string(),
      },
    }
  }

  /// Storage key for the item list.
  pub fn items_key(&self) -> String {
    match self {
      CacheKey::Inspection { inspection_id } => format!("inspection:{}", inspection_id),
      CacheKey::Unit { unit_id } => format!("unit:{}", unit_id),
    }
  }

  /// Storage key for the pending-delete id set.
  pub fn deletes_key(&self) -> String {
    format!("deletes:{}", self.items_key())
  }

  /// Scope prefix for photo storage paths: the inspection id once known,
  /// the unit id before that.
  pub fn owner_scope(&self) -> &str {
    match self {
      CacheKey::Inspection { inspection_id } => inspection_id,
      CacheKey::Unit { unit_id } => unit_id,
    }
  }

  /// Human-readable description for logs.
  pub fn description(&self) -> String {
    match self {
      CacheKey::Inspection { inspection_id } => format!("inspection {}", inspection_id),
      CacheKey::Unit { unit_id } => format!("unit {} (no inspection yet)", unit_id),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolves_to_unit_key_without_inspection() {
    let key = CacheKey::resolve(None, "U-12");
    assert_eq!(key.items_key(), "unit:U-12");
    assert_eq!(key.deletes_key(), "deletes:unit:U-12");
    assert_eq!(key.owner_scope(), "U-12");
  }

  #[test]
  fn test_resolves_to_inspection_key_once_known() {
    let key = CacheKey::resolve(Some("insp-9f3"), "U-12");
    assert_eq!(key.items_key(), "inspection:insp-9f3");
    assert_eq!(key.deletes_key(), "deletes:inspection:insp-9f3");
    assert_eq!(key.owner_scope(), "insp-9f3");
  }

  #[test]
  fn test_stable_for_same_identity_state() {
    assert_eq!(
      CacheKey::resolve(Some("insp-1"), "U-1"),
      CacheKey::resolve(Some("insp-1"), "U-other"),
    );
    assert_ne!(
      CacheKey::resolve(None, "U-1"),
      CacheKey::resolve(Some("insp-1"), "U-1"),
    );
  }
}
