use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

/// Joins `rel` under `root`, rejecting absolute paths and `..` segments so a
/// maliciously-crafted snapshot can't write outside the restore target.
pub fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);
    if p.is_absolute() || rel.contains("../") || rel.contains("..\\") || rel == ".." {
        return Err(VaultError::InvalidInput(format!("unsafe path: {rel}")));
    }
    Ok(root.join(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_traversal() {
        let root = Path::new("/out");
        assert!(safe_join(root, "../../etc/passwd").is_err());
    }

    #[test]
    fn rejects_absolute() {
        let root = Path::new("/out");
        assert!(safe_join(root, "/etc/passwd").is_err());
    }

    #[test]
    fn joins_relative_paths() {
        let root = Path::new("/out");
        assert_eq!(safe_join(root, "sub/a.txt").unwrap(), Path::new("/out/sub/a.txt"));
    }
}
