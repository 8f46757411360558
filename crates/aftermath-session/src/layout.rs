//! Storage layout
//!
//! Every artifact lives directly under one storage root and is named
//! `<token>.<role>`. Paths are a pure function of the root, the token and the
//! role, so a fetch that only carries the token can find its artifact without
//! any shared state.

use crate::token::SessionToken;
use std::path::{Path, PathBuf};

/// Role of an artifact within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactRole {
    /// Uploaded "before" image
    Before,
    /// Uploaded "after" image
    After,
    /// Visualization written by the collaborator, awaiting one fetch
    Result,
    /// Visualization claimed by a fetch and currently being streamed
    Serving,
}

impl ArtifactRole {
    /// All roles, in creation order
    pub const ALL: [Self; 4] = [Self::Before, Self::After, Self::Result, Self::Serving];

    /// File name suffix for this role
    #[inline]
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            // Image writers pick their encoder from the extension.
            Self::Result => "result.jpg",
            Self::Serving => "serving.jpg",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.suffix() == suffix)
    }
}

/// Uploaded input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputRole {
    /// Image taken before the event
    Before,
    /// Image taken after the event
    After,
}

impl InputRole {
    /// Multipart field name for this input
    #[inline]
    #[must_use]
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl From<InputRole> for ArtifactRole {
    fn from(role: InputRole) -> Self {
        match role {
            InputRole::Before => ArtifactRole::Before,
            InputRole::After => ArtifactRole::After,
        }
    }
}

/// Path derivation under a storage root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    /// Create layout rooted at `root`
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the artifact with `role` for `token`
    #[must_use]
    pub fn path(&self, token: &SessionToken, role: ArtifactRole) -> PathBuf {
        self.root.join(format!("{token}.{}", role.suffix()))
    }

    /// Recognize a file name produced by this layout
    ///
    /// Returns `None` for anything the layout did not name, so foreign files
    /// in the root are never touched.
    #[must_use]
    pub fn parse_file_name(name: &str) -> Option<(SessionToken, ArtifactRole)> {
        let (token, suffix) = name.split_once('.')?;
        let token = token.parse().ok()?;
        let role = ArtifactRole::from_suffix(suffix)?;
        Some((token, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token() -> SessionToken {
        "00112233445566778899aabbccddeeff".parse().unwrap()
    }

    #[test]
    fn paths_are_token_plus_role() {
        let layout = StorageLayout::new("/srv/uploads");
        assert_eq!(
            layout.path(&token(), ArtifactRole::Before),
            PathBuf::from("/srv/uploads/00112233445566778899aabbccddeeff.before")
        );
        assert_eq!(
            layout.path(&token(), ArtifactRole::Result),
            PathBuf::from("/srv/uploads/00112233445566778899aabbccddeeff.result.jpg")
        );
    }

    #[test]
    fn roles_never_share_a_path() {
        let layout = StorageLayout::new("root");
        let t = token();
        let paths: std::collections::HashSet<_> =
            ArtifactRole::ALL.iter().map(|r| layout.path(&t, *r)).collect();
        assert_eq!(paths.len(), ArtifactRole::ALL.len());
    }

    #[test]
    fn parses_own_names_only() {
        for role in ArtifactRole::ALL {
            let name = format!("{}.{}", token(), role.suffix());
            assert_eq!(StorageLayout::parse_file_name(&name), Some((token(), role)));
        }
        assert_eq!(StorageLayout::parse_file_name("result.jpg"), None);
        assert_eq!(StorageLayout::parse_file_name(".gitkeep"), None);
        assert_eq!(
            StorageLayout::parse_file_name("00112233445566778899aabbccddeeff.png"),
            None
        );
    }

    #[test]
    fn input_roles_map_to_artifact_roles() {
        assert_eq!(ArtifactRole::from(InputRole::Before), ArtifactRole::Before);
        assert_eq!(ArtifactRole::from(InputRole::After), ArtifactRole::After);
        assert_eq!(InputRole::After.field_name(), "after");
    }
}
