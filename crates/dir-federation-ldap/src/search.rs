//! LDAP search operations.
//!
//! Translates [`UserQuery`] values into RFC 4515 filters and search results
//! into [`DirectoryEntry`] values.

use dir_federation::{Criterion, UserQuery};
use dir_model::DirectoryEntry;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{SearchEntry, SearchOptions, SearchResult};

use crate::config::LdapConfig;
use crate::connection::LdapConnection;
use crate::error::{LdapError, LdapResult};

/// Search result codes.
const SUCCESS: u32 = 0;
const SIZE_LIMIT_EXCEEDED: u32 = 4;
const NO_SUCH_OBJECT: u32 = 32;

// ============================================================================
// Escaping and identifiers
// ============================================================================

/// Escapes special characters in LDAP filter values.
#[must_use]
pub fn ldap_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

/// Formats a binary Active Directory GUID as its canonical string.
///
/// The first three groups are stored little-endian. Values that are not 16
/// bytes long are hex-encoded as-is.
#[must_use]
pub fn guid_to_string(bytes: &[u8]) -> String {
    if bytes.len() != 16 {
        return hex::encode(bytes);
    }

    format!(
        "{}-{}-{}-{}-{}",
        hex::encode([bytes[3], bytes[2], bytes[1], bytes[0]]),
        hex::encode([bytes[5], bytes[4]]),
        hex::encode([bytes[7], bytes[6]]),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..16]),
    )
}

/// Converts a canonical GUID string back to its binary Active Directory form.
///
/// # Errors
///
/// Returns `InvalidGuid` if the value is not 32 hex digits (dashes allowed).
pub fn guid_to_bytes(guid: &str) -> LdapResult<[u8; 16]> {
    let digits: String = guid.chars().filter(|c| *c != '-').collect();
    let decoded = hex::decode(&digits).map_err(|e| LdapError::InvalidGuid(format!("{guid}: {e}")))?;
    let raw: [u8; 16] = decoded
        .try_into()
        .map_err(|_| LdapError::InvalidGuid(format!("{guid}: expected 16 bytes")))?;

    let mut bytes = raw;
    bytes[..4].reverse();
    bytes[4..6].reverse();
    bytes[6..8].reverse();
    Ok(bytes)
}

/// Renders bytes as an escaped filter value (`\xx` per byte).
#[must_use]
pub fn escape_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("\\{b:02x}")).collect()
}

// ============================================================================
// Filters
// ============================================================================

/// Builds LDAP filters for one domain.
#[derive(Debug, Clone)]
pub struct FilterBuilder<'a> {
    config: &'a LdapConfig,
}

impl<'a> FilterBuilder<'a> {
    /// Creates a filter builder.
    #[must_use]
    pub const fn new(config: &'a LdapConfig) -> Self {
        Self { config }
    }

    /// Renders a single criterion.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGuid` if a binary identifier cannot be encoded.
    pub fn criterion(&self, criterion: &Criterion) -> LdapResult<String> {
        Ok(match criterion {
            Criterion::Guid { attribute, value } => {
                let value = if self.config.guid_is_binary() {
                    escape_bytes(&guid_to_bytes(value)?)
                } else {
                    ldap_escape(value)
                };
                format!("({attribute}={value})")
            }
            Criterion::Equals { attribute, value } => {
                format!("({attribute}={})", ldap_escape(value))
            }
            Criterion::Present(attribute) => format!("({attribute}=*)"),
            Criterion::Raw(filter) => wrap(filter.trim()),
        })
    }

    /// Renders a query restricted to the configured user filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidGuid` if a binary identifier cannot be encoded.
    pub fn query(&self, query: &UserQuery) -> LdapResult<String> {
        let mut parts = Vec::with_capacity(query.criteria.len() + 1);
        let user_filter = self.config.user_filter.trim();
        if !user_filter.is_empty() {
            parts.push(wrap(user_filter));
        }
        for criterion in &query.criteria {
            parts.push(self.criterion(criterion)?);
        }

        Ok(match parts.len() {
            0 => "(objectClass=*)".to_string(),
            1 => parts.remove(0),
            _ => format!("(&{})", parts.concat()),
        })
    }
}

fn wrap(filter: &str) -> String {
    if filter.starts_with('(') {
        filter.to_string()
    } else {
        format!("({filter})")
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Converts a search entry into a [`DirectoryEntry`] tagged with the domain.
///
/// Returns `None` for entries without an identifier.
#[must_use]
pub fn to_directory_entry(entry: SearchEntry, config: &LdapConfig) -> Option<DirectoryEntry> {
    let guid_attribute = config.guid_attribute.as_str();
    let guid = entry
        .bin_attrs
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(guid_attribute))
        .and_then(|(_, values)| values.first())
        .map(|bytes| guid_to_string(bytes))
        .or_else(|| {
            entry
                .attrs
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(guid_attribute))
                .and_then(|(_, values)| values.first().cloned())
        })
        .filter(|guid| !guid.is_empty());

    let Some(guid) = guid else {
        tracing::warn!(dn = %entry.dn, attribute = guid_attribute, "Skipping entry without identifier");
        return None;
    };

    let mut converted = DirectoryEntry::new(entry.dn, guid).with_domain(config.domain.clone());
    for (name, values) in entry.attrs {
        if !name.eq_ignore_ascii_case(guid_attribute) {
            converted.set_attribute(&name, values);
        }
    }
    Some(converted)
}

/// User search helper.
pub struct LdapSearcher<'a> {
    conn: &'a mut LdapConnection,
    config: &'a LdapConfig,
}

impl<'a> LdapSearcher<'a> {
    /// Creates a new searcher.
    pub fn new(conn: &'a mut LdapConnection, config: &'a LdapConfig) -> Self {
        Self { conn, config }
    }

    /// Runs a user query.
    ///
    /// Queries without a limit are listed page by page and either return
    /// every matching entry or fail; they are never silently truncated.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid identifiers, transport failures,
    /// unexpected result codes and listings larger than `max_results`.
    pub async fn search(&mut self, query: &UserQuery) -> LdapResult<Vec<DirectoryEntry>> {
        let filter = FilterBuilder::new(self.config).query(query)?;
        let attributes: Vec<&str> = query.attributes.iter().map(String::as_str).collect();

        match query.limit {
            Some(limit) => {
                let limit = match self.config.max_results {
                    0 => limit,
                    max => limit.min(max),
                };
                self.search_bounded(&filter, attributes, limit).await
            }
            None => {
                let entries = self.search_paged(&filter, attributes).await?;
                check_cap(entries.len(), self.config.max_results)?;
                Ok(entries)
            }
        }
    }

    async fn search_bounded(
        &mut self,
        filter: &str,
        attributes: Vec<&str>,
        limit: usize,
    ) -> LdapResult<Vec<DirectoryEntry>> {
        tracing::debug!(base = %self.config.base_dn, filter = %filter, limit, "LDAP search");

        let SearchResult(entries, result) = self
            .conn
            .ldap_mut()?
            .with_timeout(self.config.connection_timeout)
            .with_search_options(
                SearchOptions::new().sizelimit(i32::try_from(limit).unwrap_or(i32::MAX)),
            )
            .search(
                &self.config.base_dn,
                self.config.search_scope.to_ldap3(),
                filter,
                attributes,
            )
            .await
            .map_err(|e| LdapError::search(e.to_string()))?;

        if !check_result(result.rc, &result.text, entries.len(), Some(limit))? {
            return Ok(Vec::new());
        }

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .filter_map(|entry| to_directory_entry(entry, self.config))
            .take(limit)
            .collect())
    }

    async fn search_paged(
        &mut self,
        filter: &str,
        attributes: Vec<&str>,
    ) -> LdapResult<Vec<DirectoryEntry>> {
        let page_size = i32::try_from(self.config.page_size).unwrap_or(i32::MAX);
        tracing::debug!(base = %self.config.base_dn, filter = %filter, page_size, "LDAP paged search");

        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(page_size)),
        ];
        let mut stream = self
            .conn
            .ldap_mut()?
            .with_timeout(self.config.connection_timeout)
            .streaming_search_with(
                adapters,
                &self.config.base_dn,
                self.config.search_scope.to_ldap3(),
                filter,
                attributes,
            )
            .await
            .map_err(|e| LdapError::search(e.to_string()))?;

        let mut received = 0;
        let mut entries = Vec::new();
        while let Some(entry) = stream
            .next()
            .await
            .map_err(|e| LdapError::search(e.to_string()))?
        {
            received += 1;
            if let Some(entry) = to_directory_entry(SearchEntry::construct(entry), self.config) {
                entries.push(entry);
            }
        }

        let result = stream.finish().await;
        if !check_result(result.rc, &result.text, received, None)? {
            return Ok(Vec::new());
        }

        Ok(entries)
    }
}

/// Classifies a search result code. Returns `false` when the base object
/// does not exist.
///
/// A size-limit result is only accepted for bounded searches that received
/// the requested number of entries; anything less means the server cut the
/// result short.
fn check_result(rc: u32, text: &str, received: usize, limit: Option<usize>) -> LdapResult<bool> {
    match (rc, limit) {
        (SUCCESS, _) => Ok(true),
        (SIZE_LIMIT_EXCEEDED, Some(limit)) if received >= limit => Ok(true),
        (SIZE_LIMIT_EXCEEDED, _) => Err(LdapError::search(format!(
            "server size limit reached after {received} entries: {text}"
        ))),
        (NO_SUCH_OBJECT, _) => Ok(false),
        (rc, _) => Err(LdapError::search(format!("result code {rc}: {text}"))),
    }
}

/// Rejects listings larger than the configured maximum.
fn check_cap(count: usize, max_results: usize) -> LdapResult<()> {
    if max_results > 0 && count > max_results {
        return Err(LdapError::search(format!(
            "listing returned {count} entries, more than max_results ({max_results})"
        )));
    }
    Ok(())
}
