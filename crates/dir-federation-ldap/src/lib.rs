//! # dir-federation-ldap
//!
//! LDAP backend for the directory account bridge, built on `ldap3`.
//!
//! [`LdapDirectory`] implements the [`dir_federation::Directory`] facade:
//! resolver queries are rendered as RFC 4515 filters restricted to the
//! configured user filter, binary Active Directory `objectGUID` values are
//! converted to and from their canonical string form, and every returned
//! entry is tagged with its domain name.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod provider;
pub mod search;

pub use config::{LdapConfig, LdapConfigBuilder, SearchScope};
pub use connection::{LdapConnection, LdapConnectionPool};
pub use error::{LdapError, LdapResult};
pub use provider::LdapDirectory;
pub use search::{guid_to_bytes, guid_to_string, ldap_escape, FilterBuilder};
