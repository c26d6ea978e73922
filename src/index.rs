//! Link index seam.
//!
//! The exporter never parses link syntax on its own. Reference resolution and
//! the vault-wide link list come from a [`LinkIndex`]; the production one is
//! [`VaultIndex`](crate::vault::VaultIndex).

pub trait LinkIndex: Send + Sync {
    /// Vault-relative path of the document `raw_target` points at, resolved
    /// from the document at `from_path`. `None` when nothing matches.
    fn resolve_reference(&self, raw_target: &str, from_path: &str) -> Option<String>;

    /// Every resolved internal link as `(source_path, target_path)`.
    fn all_internal_links(&self) -> Vec<(String, String)>;
}
