//! # iris-themes: Themes, Derivations and Ambits
//!
//! A theme (`ElementDetail`) is the category a record card is filed under.
//! It carries the derivation tables that say which group should own a
//! record in a given state, optionally per district, and the SLA delay
//! used to compute the record's ANS deadline.
//!
//! [`AmbitResolver`] combines the theme catalog with the group tree to
//! answer "may this group act on this record without cross-ambit
//! restrictions?".

pub mod ambit;
pub mod catalog;
pub mod element_detail;

pub use ambit::{AmbitQuery, AmbitResolver};
pub use catalog::{ThemeCatalog, ThemeError};
pub use element_detail::{AnsDelay, DelayKind, DirectDerivation, DistrictDerivation, ElementDetail};
