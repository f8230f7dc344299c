//! Database format versioning.
//!
//! The relational store records its schema version on disk. On open the
//! stored version is classified against the versions this build knows:
//! - `Fresh`: nothing stored yet, create the schema
//! - `Current`: nothing to do
//! - `Migrate`: old but supported, apply targeted schema changes
//! - `Rebuild`: too old to migrate, drop and recreate
//! - `TooNew`: written by a newer build, refuse to touch it

/// Current database format version.
pub const DATABASE_FORMAT_VERSION: u32 = 2;

/// Oldest on-disk format that can be migrated in place.
pub const MIN_MIGRATABLE_FORMAT: u32 = 1;

/// How a stored format version relates to the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatCompatibility {
    /// No schema has been written yet.
    Fresh,
    /// Same version as this build.
    Current,
    /// Older, migratable with targeted changes.
    Migrate,
    /// Older than anything migratable; needs a full rebuild.
    Rebuild,
    /// Written by a newer build.
    TooNew,
}

impl FormatCompatibility {
    /// Checks if the database can be used after any required work.
    #[must_use]
    pub fn can_open(self) -> bool {
        !matches!(self, Self::TooNew)
    }
}

/// Classifies a stored format version.
#[must_use]
pub fn check_format(stored: u32) -> FormatCompatibility {
    if stored == 0 {
        FormatCompatibility::Fresh
    } else if stored == DATABASE_FORMAT_VERSION {
        FormatCompatibility::Current
    } else if stored > DATABASE_FORMAT_VERSION {
        FormatCompatibility::TooNew
    } else if stored >= MIN_MIGRATABLE_FORMAT {
        FormatCompatibility::Migrate
    } else {
        FormatCompatibility::Rebuild
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_format_cannot_open() {
        let compat = check_format(DATABASE_FORMAT_VERSION + 1);
        assert_eq!(compat, FormatCompatibility::TooNew);
        assert!(!compat.can_open());
    }

    #[test]
    fn test_older_format_migrates() {
        let compat = check_format(MIN_MIGRATABLE_FORMAT);
        assert_eq!(compat, FormatCompatibility::Migrate);
        assert!(compat.can_open());
    }
}
