//! # Theme Catalog
//!
//! Read-shared, write-exclusive store of themes. Every write bumps a
//! revision counter that derived caches compare against.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use thiserror::Error;

use iris_core::{keys, IncludeDeleted, ThemeId, Timestamp};

use crate::element_detail::ElementDetail;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThemeError {
    #[error("{0} not found")]
    NotFound(ThemeId),

    #[error("{0} already exists")]
    Duplicate(ThemeId),

    #[error("{theme} has an ANS delay of {days} days; the limit is {max}", max = keys::MAX_DAYS)]
    DelayOutOfRange { theme: ThemeId, days: u32 },
}

fn check_delay(theme: &ElementDetail) -> Result<(), ThemeError> {
    match theme.ans_delay {
        Some(delay) if !delay.is_within_bounds() => Err(ThemeError::DelayOutOfRange {
            theme: theme.id,
            days: delay.days,
        }),
        _ => Ok(()),
    }
}

#[derive(Debug, Default)]
struct Inner {
    revision: u64,
    themes: BTreeMap<ThemeId, ElementDetail>,
}

/// All themes, keyed by id.
#[derive(Debug, Default)]
pub struct ThemeCatalog {
    inner: RwLock<Inner>,
}

impl ThemeCatalog {
    pub fn new(themes: impl IntoIterator<Item = ElementDetail>) -> Result<Self, ThemeError> {
        let mut map = BTreeMap::new();
        for theme in themes {
            check_delay(&theme)?;
            let id = theme.id;
            if map.insert(id, theme).is_some() {
                return Err(ThemeError::Duplicate(id));
            }
        }
        Ok(Self {
            inner: RwLock::new(Inner {
                revision: 1,
                themes: map,
            }),
        })
    }

    /// Incremented on every write.
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    pub fn len(&self) -> usize {
        self.inner.read().themes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().themes.is_empty()
    }

    pub fn get(&self, id: ThemeId, visibility: IncludeDeleted) -> Option<ElementDetail> {
        self.inner
            .read()
            .themes
            .get(&id)
            .filter(|t| visibility.admits(t.is_deleted()))
            .cloned()
    }

    pub fn list(&self, visibility: IncludeDeleted) -> Vec<ElementDetail> {
        self.inner
            .read()
            .themes
            .values()
            .filter(|t| visibility.admits(t.is_deleted()))
            .cloned()
            .collect()
    }

    /// Insert or replace a theme, returning the previous version.
    pub fn upsert(&self, theme: ElementDetail) -> Result<Option<ElementDetail>, ThemeError> {
        check_delay(&theme)?;
        let mut inner = self.inner.write();
        inner.revision += 1;
        tracing::debug!(theme = %theme.id, revision = inner.revision, "theme upserted");
        Ok(inner.themes.insert(theme.id, theme))
    }

    /// Soft-delete a theme. Deleting twice keeps the first timestamp.
    pub fn soft_delete(&self, id: ThemeId, at: Timestamp) -> Result<(), ThemeError> {
        let mut inner = self.inner.write();
        let theme = inner.themes.get_mut(&id).ok_or(ThemeError::NotFound(id))?;
        if theme.deleted_at.is_none() {
            theme.deleted_at = Some(at);
        }
        inner.revision += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element_detail::AnsDelay;

    #[test]
    fn soft_delete_hides_by_default() {
        let catalog = ThemeCatalog::new(vec![ElementDetail::new(ThemeId(1), "Neteja")]).unwrap();
        let rev = catalog.revision();
        let at = Timestamp::parse("2026-03-01T00:00:00Z").unwrap();
        catalog.soft_delete(ThemeId(1), at).unwrap();
        assert!(catalog.revision() > rev);
        assert!(catalog.get(ThemeId(1), IncludeDeleted::No).is_none());
        assert_eq!(
            catalog.get(ThemeId(1), IncludeDeleted::Yes).unwrap().deleted_at,
            Some(at)
        );
        assert!(catalog.list(IncludeDeleted::No).is_empty());
        assert_eq!(catalog.list(IncludeDeleted::Yes).len(), 1);
        assert_eq!(
            catalog.soft_delete(ThemeId(2), at).unwrap_err(),
            ThemeError::NotFound(ThemeId(2))
        );
    }

    #[test]
    fn duplicates_and_upsert() {
        assert_eq!(
            ThemeCatalog::new(vec![
                ElementDetail::new(ThemeId(1), "a"),
                ElementDetail::new(ThemeId(1), "b"),
            ])
            .unwrap_err(),
            ThemeError::Duplicate(ThemeId(1))
        );
        let catalog = ThemeCatalog::default();
        assert!(catalog.upsert(ElementDetail::new(ThemeId(1), "a")).unwrap().is_none());
        let previous = catalog.upsert(ElementDetail::new(ThemeId(1), "b")).unwrap().unwrap();
        assert_eq!(previous.description, "a");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn oversized_delay_is_rejected() {
        let huge = ElementDetail::new(ThemeId(5), "Voreres")
            .with_ans_delay(AnsDelay::natural(200_000_000));
        let expected = ThemeError::DelayOutOfRange {
            theme: ThemeId(5),
            days: 200_000_000,
        };
        assert_eq!(ThemeCatalog::new(vec![huge.clone()]).unwrap_err(), expected);

        let catalog = ThemeCatalog::default();
        let rev = catalog.revision();
        assert_eq!(catalog.upsert(huge).unwrap_err(), expected);
        assert_eq!(catalog.revision(), rev);
        assert!(catalog.is_empty());
        assert!(ThemeCatalog::new(vec![
            ElementDetail::new(ThemeId(6), "Soroll").with_ans_delay(AnsDelay::business(3650))
        ])
        .is_ok());
    }
}
