/// The two version-tagged store names of the current deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
  pub static_store: String,
  pub runtime_store: String,
}

impl StoreNames {
  /// `<prefix>-static-<version>` and `<prefix>-runtime-<version>`.
  pub fn new(prefix: &str, version: &str) -> Self {
    Self {
      static_store: format!("{}-static-{}", prefix, version),
      runtime_store: format!("{}-runtime-{}", prefix, version),
    }
  }

  /// Whether `name` belongs to the current generation.
  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_store || name == self.runtime_store
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_names_embed_version() {
    let names = StoreNames::new("rental-dashboard", "v7");
    assert_eq!(names.static_store, "rental-dashboard-static-v7");
    assert_eq!(names.runtime_store, "rental-dashboard-runtime-v7");
  }

  #[test]
  fn test_only_exact_names_are_current() {
    let names = StoreNames::new("rental-dashboard", "v7");
    assert!(names.is_current("rental-dashboard-static-v7"));
    assert!(names.is_current("rental-dashboard-runtime-v7"));
    assert!(!names.is_current("rental-dashboard-static-v6"));
    assert!(!names.is_current("rental-dashboard-static-v70"));
    assert!(!names.is_current("other-app"));
  }
}
