//! Versioned schema registry keyed by entity.
//!
//! The registry owns the persisted version history of every known
//! entity: an ordered set of immutable versions plus a current-version
//! pointer, keyed by a structural hash over the mapped schema. The
//! store is a single JSON document loaded fully at construction and
//! rewritten atomically on every mutation (see [`crate::storage`]).
//!
//! Hash-unchanged submissions are no-ops by design: resubmitting an
//! identical schema never creates version churn, which also makes
//! retried writes safe. Concurrent writers targeting the same entity
//! must be serialized by the caller; reads may run concurrently with
//! each other but not with a write to the same entity.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use snafu::{prelude::*, Backtrace};

use crate::mapping::MappedColumn;
use crate::storage::{self, StorageError, StoreLocation};

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors raised by registry operations.
#[derive(Debug, Snafu)]
pub enum RegistryError {
    /// `register_new_entity` refuses to overwrite existing history.
    #[snafu(display("entity '{entity}' already exists in the registry"))]
    EntityAlreadyExists {
        /// The entity that was already registered.
        entity: String,
    },

    /// Version operations require a previously registered entity.
    #[snafu(display("entity '{entity}' does not exist in the registry"))]
    UnknownEntity {
        /// The entity that was not found.
        entity: String,
    },

    /// The persisted registry document failed to parse or violated an
    /// internal invariant.
    #[snafu(display("registry store is corrupt: {msg}"))]
    CorruptStore {
        /// Description of the corruption.
        msg: String,
        /// Backtrace captured when the error occurred.
        backtrace: Backtrace,
    },

    /// A storage-layer failure while loading or flushing the document.
    #[snafu(display("registry storage failure: {source}"))]
    Storage {
        /// The underlying storage error.
        source: StorageError,
    },
}

/// Errors produced when parsing a version identifier such as `v3`.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseVersionIdError {
    /// Version identifiers start with a `v` prefix.
    #[snafu(display("version id '{raw}' is missing the 'v' prefix"))]
    MissingPrefix {
        /// The raw input.
        raw: String,
    },

    /// The numeric suffix failed to parse.
    #[snafu(display("version id '{raw}' has an invalid numeric suffix: {source}"))]
    InvalidNumber {
        /// The raw input.
        raw: String,
        /// The parse error from the numeric suffix.
        source: std::num::ParseIntError,
    },
}

/// Identifier of one schema version: `v1`, `v2`, ... with a strictly
/// increasing numeric suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(u32);

impl VersionId {
    /// The first version of every entity.
    pub const FIRST: VersionId = VersionId(1);

    /// Numeric suffix of this version.
    pub fn number(&self) -> u32 {
        self.0
    }

    /// The next version in sequence.
    pub fn next(&self) -> VersionId {
        VersionId(self.0 + 1)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for VersionId {
    type Err = ParseVersionIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let raw = input.trim();
        let Some(suffix) = raw.strip_prefix('v') else {
            return MissingPrefixSnafu {
                raw: raw.to_string(),
            }
            .fail();
        };
        let number = suffix.parse().map_err(|source| {
            ParseVersionIdError::InvalidNumber {
                raw: raw.to_string(),
                source,
            }
        })?;
        Ok(VersionId(number))
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// One immutable (except when current, see
/// [`SchemaRegistry::update_current_version_schema`]) schema version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionRecord {
    /// Version identifier.
    pub version: VersionId,
    /// Physical table name for this version: `{entity}_{version}`.
    pub table_name: String,
    /// Structural hash of `schema`.
    pub schema_hash: String,
    /// When the version was first created.
    pub generated_at: DateTime<Utc>,
    /// When the version was last mutated in place.
    pub modified_at: DateTime<Utc>,
    /// Whether this version was created by a breaking change.
    pub breaking_change: bool,
    /// Human-readable history of the changes folded into this version.
    pub change_summary: Vec<String>,
    /// The mapped schema snapshot.
    pub schema: Vec<MappedColumn>,
}

/// Persisted state for one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistryEntry {
    /// The entity name (also the registry key).
    pub entity: String,
    /// The version all non-breaking updates fold into.
    pub current_version: VersionId,
    /// All versions, keyed by identifier.
    pub versions: BTreeMap<VersionId, VersionRecord>,
}

/// Compute the structural hash of a mapped schema.
///
/// Each top-level column is normalized to `(name, type, mode)` —
/// descriptions and nested detail are documentation, not structure —
/// sorted by name so the digest is order-independent, and fed to a
/// domain-separated hasher with `\0` delimiters.
pub fn compute_structural_hash(schema: &[MappedColumn]) -> String {
    let mut entries: Vec<(&str, &str, &str)> = schema
        .iter()
        .map(|column| {
            (
                column.name.as_str(),
                column.column_type.as_str(),
                column.mode.as_str(),
            )
        })
        .collect();
    entries.sort_unstable();

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"schema-hash-v1");
    for (name, column_type, mode) in entries {
        hasher.update(b"\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(column_type.as_bytes());
        hasher.update(b"\0");
        hasher.update(mode.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// File-backed schema registry.
///
/// Construct one handle per process or connection with [`open`]; never a
/// hidden process-wide singleton. Every mutating operation flushes the
/// full document back to storage before returning.
///
/// [`open`]: SchemaRegistry::open
#[derive(Debug)]
pub struct SchemaRegistry {
    location: StoreLocation,
    data: BTreeMap<String, RegistryEntry>,
}

impl SchemaRegistry {
    /// Open (or initialize) a registry at the given location.
    ///
    /// A missing file is a fresh, empty registry; an unparseable file is
    /// reported as corruption rather than silently discarded.
    pub async fn open(location: StoreLocation) -> RegistryResult<Self> {
        let data = match storage::read_to_string(&location).await {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| RegistryError::CorruptStore {
                    msg: format!("failed to parse registry document: {e}"),
                    backtrace: Backtrace::capture(),
                })?
            }
            Err(StorageError::NotFound { .. }) => BTreeMap::new(),
            Err(source) => return Err(RegistryError::Storage { source }),
        };

        Ok(SchemaRegistry { location, data })
    }

    /// Where this registry persists its document.
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Look up an entity's full history.
    pub fn get_entity(&self, entity: &str) -> Option<&RegistryEntry> {
        self.data.get(entity)
    }

    /// The current version id of an entity, if registered.
    pub fn get_current_version(&self, entity: &str) -> Option<VersionId> {
        self.data.get(entity).map(|entry| entry.current_version)
    }

    /// The current version record of a registered entity.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` when the entity is not registered; `CorruptStore`
    /// when the current pointer names a missing version.
    pub fn current_record(&self, entity: &str) -> RegistryResult<&VersionRecord> {
        let entry = self.data.get(entity).context(UnknownEntitySnafu {
            entity: entity.to_string(),
        })?;
        current_record_of(entry)
    }

    async fn flush(&self) -> RegistryResult<()> {
        let json = serde_json::to_vec_pretty(&self.data).map_err(|e| {
            RegistryError::CorruptStore {
                msg: format!("failed to serialize registry document: {e}"),
                backtrace: Backtrace::capture(),
            }
        })?;
        storage::write_atomic(&self.location, &json)
            .await
            .context(StorageSnafu)
    }

    fn new_record(
        entity: &str,
        version: VersionId,
        schema: Vec<MappedColumn>,
        schema_hash: String,
        breaking_change: bool,
        change_summary: Vec<String>,
    ) -> VersionRecord {
        let now = Utc::now();
        VersionRecord {
            version,
            table_name: format!("{entity}_{version}"),
            schema_hash,
            generated_at: now,
            modified_at: now,
            breaking_change,
            change_summary,
            schema,
        }
    }

    /// Register a previously unknown entity, creating version `v1`.
    ///
    /// # Errors
    ///
    /// `EntityAlreadyExists` when history for the entity is present.
    pub async fn register_new_entity(
        &mut self,
        entity: &str,
        schema: Vec<MappedColumn>,
    ) -> RegistryResult<VersionId> {
        if self.data.contains_key(entity) {
            return EntityAlreadyExistsSnafu {
                entity: entity.to_string(),
            }
            .fail();
        }

        let schema_hash = compute_structural_hash(&schema);
        let record = Self::new_record(
            entity,
            VersionId::FIRST,
            schema,
            schema_hash,
            false,
            vec!["initial version".to_string()],
        );

        self.data.insert(
            entity.to_string(),
            RegistryEntry {
                entity: entity.to_string(),
                current_version: VersionId::FIRST,
                versions: BTreeMap::from([(VersionId::FIRST, record)]),
            },
        );

        self.flush().await?;
        Ok(VersionId::FIRST)
    }

    /// Register a new version of an existing entity and advance the
    /// current-version pointer.
    ///
    /// Identical schemas are a no-op: when the structural hash equals
    /// the current version's hash, the current version id is returned
    /// unchanged and nothing is persisted. This prevents spurious
    /// version churn from resubmitting identical schemas.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` when the entity has never been registered.
    pub async fn register_new_version(
        &mut self,
        entity: &str,
        schema: Vec<MappedColumn>,
        breaking: bool,
        change_summary: Vec<String>,
    ) -> RegistryResult<VersionId> {
        let new_hash = compute_structural_hash(&schema);
        let entry = self.data.get_mut(entity).context(UnknownEntitySnafu {
            entity: entity.to_string(),
        })?;
        let current = current_record_of(entry)?;
        if new_hash == current.schema_hash {
            return Ok(current.version);
        }

        let next_version = current.version.next();
        let record = Self::new_record(entity, next_version, schema, new_hash, breaking, change_summary);
        entry.versions.insert(next_version, record);
        entry.current_version = next_version;

        self.flush().await?;
        Ok(next_version)
    }

    /// Fold a non-breaking schema change into the current version.
    ///
    /// This is the only case where a stored version is mutated rather
    /// than superseded: the current version's schema, hash, and
    /// `modified_at` are replaced and the change summary grows. A
    /// hash-unchanged schema is a no-op.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` when the entity has never been registered.
    pub async fn update_current_version_schema(
        &mut self,
        entity: &str,
        schema: Vec<MappedColumn>,
        change_summary: Vec<String>,
    ) -> RegistryResult<VersionId> {
        let new_hash = compute_structural_hash(&schema);
        let entry = self.data.get_mut(entity).context(UnknownEntitySnafu {
            entity: entity.to_string(),
        })?;
        let current_version = entry.current_version;
        let record = current_record_mut(entry)?;
        if new_hash == record.schema_hash {
            return Ok(current_version);
        }

        record.schema = schema;
        record.schema_hash = new_hash;
        record.modified_at = Utc::now();
        record.change_summary.extend(change_summary);

        self.flush().await?;
        Ok(current_version)
    }
}

fn missing_current_record(entry: &RegistryEntry) -> RegistryError {
    RegistryError::CorruptStore {
        msg: format!(
            "entity '{}' current version {} has no record",
            entry.entity, entry.current_version
        ),
        backtrace: Backtrace::capture(),
    }
}

fn current_record_of(entry: &RegistryEntry) -> RegistryResult<&VersionRecord> {
    entry
        .versions
        .get(&entry.current_version)
        .ok_or_else(|| missing_current_record(entry))
}

fn current_record_mut(entry: &mut RegistryEntry) -> RegistryResult<&mut VersionRecord> {
    let current_version = entry.current_version;
    let entity = entry.entity.clone();
    entry
        .versions
        .get_mut(&current_version)
        .ok_or_else(|| RegistryError::CorruptStore {
            msg: format!("entity '{entity}' current version {current_version} has no record"),
            backtrace: Backtrace::capture(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ColumnMode, MappedType};
    use tempfile::TempDir;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn column(name: &str, column_type: MappedType, mode: ColumnMode) -> MappedColumn {
        MappedColumn {
            name: name.into(),
            column_type,
            mode,
            description: None,
            fields: Vec::new(),
            range_element_type: None,
        }
    }

    fn orders_schema() -> Vec<MappedColumn> {
        vec![
            column("id", MappedType::Int64, ColumnMode::Required),
            column("email", MappedType::String, ColumnMode::Nullable),
        ]
    }

    async fn open_registry(tmp: &TempDir) -> SchemaRegistry {
        let location = StoreLocation::local(tmp.path().join("registry.json"));
        SchemaRegistry::open(location).await.expect("open registry")
    }

    #[test]
    fn version_id_display_and_parse() {
        assert_eq!(VersionId::FIRST.to_string(), "v1");
        assert_eq!(VersionId::FIRST.next().to_string(), "v2");
        assert_eq!("v12".parse::<VersionId>().unwrap().number(), 12);
        assert_eq!("v3".parse::<VersionId>().unwrap().number(), 3);
        assert!(matches!(
            "3".parse::<VersionId>().unwrap_err(),
            ParseVersionIdError::MissingPrefix { .. }
        ));
        assert!(matches!(
            "vX".parse::<VersionId>().unwrap_err(),
            ParseVersionIdError::InvalidNumber { .. }
        ));
    }

    #[test]
    fn version_id_orders_numerically() {
        let v2: VersionId = "v2".parse().unwrap();
        let v10: VersionId = "v10".parse().unwrap();
        assert!(v2 < v10);
    }

    #[test]
    fn structural_hash_is_order_independent() {
        let forward = orders_schema();
        let mut reversed = orders_schema();
        reversed.reverse();
        assert_eq!(
            compute_structural_hash(&forward),
            compute_structural_hash(&reversed)
        );
    }

    #[test]
    fn structural_hash_ignores_descriptions() {
        let plain = orders_schema();
        let mut described = orders_schema();
        described[0].description = Some("primary key".into());
        assert_eq!(
            compute_structural_hash(&plain),
            compute_structural_hash(&described)
        );
    }

    #[test]
    fn structural_hash_changes_with_name_type_or_mode() {
        let base = orders_schema();
        let base_hash = compute_structural_hash(&base);

        let mut renamed = orders_schema();
        renamed[1].name = "email_address".into();
        assert_ne!(base_hash, compute_structural_hash(&renamed));

        let mut retyped = orders_schema();
        retyped[1].column_type = MappedType::Int64;
        assert_ne!(base_hash, compute_structural_hash(&retyped));

        let mut tightened = orders_schema();
        tightened[1].mode = ColumnMode::Required;
        assert_ne!(base_hash, compute_structural_hash(&tightened));
    }

    #[tokio::test]
    async fn open_on_missing_file_is_empty() -> TestResult {
        let tmp = TempDir::new()?;
        let registry = open_registry(&tmp).await;
        assert!(registry.get_entity("orders").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn open_rejects_corrupt_document() -> TestResult {
        let tmp = TempDir::new()?;
        let path = tmp.path().join("registry.json");
        tokio::fs::write(&path, "not json").await?;

        let result = SchemaRegistry::open(StoreLocation::local(path)).await;
        assert!(matches!(result, Err(RegistryError::CorruptStore { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn register_new_entity_creates_v1() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;

        let version = registry.register_new_entity("orders", orders_schema()).await?;
        assert_eq!(version, VersionId::FIRST);

        let record = registry.current_record("orders")?;
        assert_eq!(record.table_name, "orders_v1");
        assert!(!record.breaking_change);
        assert_eq!(record.change_summary, vec!["initial version".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn register_new_entity_twice_fails() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;

        registry.register_new_entity("orders", orders_schema()).await?;
        let err = registry
            .register_new_entity("orders", orders_schema())
            .await
            .expect_err("expected EntityAlreadyExists");
        assert!(matches!(err, RegistryError::EntityAlreadyExists { entity } if entity == "orders"));
        Ok(())
    }

    #[tokio::test]
    async fn register_new_version_is_idempotent_on_unchanged_hash() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;
        registry.register_new_entity("orders", orders_schema()).await?;

        let version = registry
            .register_new_version("orders", orders_schema(), true, vec!["noise".into()])
            .await?;
        assert_eq!(version, VersionId::FIRST);
        assert_eq!(registry.get_entity("orders").unwrap().versions.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn register_new_version_advances_pointer() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;
        registry.register_new_entity("orders", orders_schema()).await?;

        let mut changed = orders_schema();
        changed.remove(1);
        let version = registry
            .register_new_version("orders", changed, true, vec!["REMOVE_COLUMN email".into()])
            .await?;
        assert_eq!(version.to_string(), "v2");
        assert_eq!(registry.get_current_version("orders"), Some(version));

        let record = registry.current_record("orders")?;
        assert!(record.breaking_change);
        assert_eq!(record.table_name, "orders_v2");

        // v1 is still present and untouched.
        let entry = registry.get_entity("orders").unwrap();
        assert_eq!(entry.versions.len(), 2);
        assert_eq!(entry.versions[&VersionId::FIRST].table_name, "orders_v1");
        Ok(())
    }

    #[tokio::test]
    async fn version_operations_require_known_entity() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;

        let err = registry
            .register_new_version("ghost", orders_schema(), false, vec![])
            .await
            .expect_err("expected UnknownEntity");
        assert!(matches!(err, RegistryError::UnknownEntity { entity } if entity == "ghost"));

        let err = registry
            .update_current_version_schema("ghost", orders_schema(), vec![])
            .await
            .expect_err("expected UnknownEntity");
        assert!(matches!(err, RegistryError::UnknownEntity { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn update_current_version_mutates_in_place() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;
        registry.register_new_entity("orders", orders_schema()).await?;

        let mut widened = orders_schema();
        widened.push(column("total", MappedType::Float64, ColumnMode::Nullable));
        let version = registry
            .update_current_version_schema("orders", widened, vec!["ADD_NULLABLE_COLUMN total".into()])
            .await?;
        assert_eq!(version, VersionId::FIRST);

        let record = registry.current_record("orders")?;
        assert_eq!(record.schema.len(), 3);
        assert_eq!(
            record.change_summary,
            vec![
                "initial version".to_string(),
                "ADD_NULLABLE_COLUMN total".to_string()
            ]
        );
        assert_eq!(registry.get_entity("orders").unwrap().versions.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn update_current_version_is_idempotent() -> TestResult {
        let tmp = TempDir::new()?;
        let mut registry = open_registry(&tmp).await;
        registry.register_new_entity("orders", orders_schema()).await?;

        let before = registry.current_record("orders")?.change_summary.clone();
        let version = registry
            .update_current_version_schema("orders", orders_schema(), vec!["noise".into()])
            .await?;
        assert_eq!(version, VersionId::FIRST);
        assert_eq!(registry.current_record("orders")?.change_summary, before);
        Ok(())
    }

    #[tokio::test]
    async fn registry_roundtrips_through_storage() -> TestResult {
        let tmp = TempDir::new()?;
        let location = StoreLocation::local(tmp.path().join("registry.json"));

        {
            let mut registry = SchemaRegistry::open(location.clone()).await?;
            registry.register_new_entity("orders", orders_schema()).await?;
            let mut changed = orders_schema();
            changed.remove(1);
            registry
                .register_new_version("orders", changed, true, vec!["REMOVE_COLUMN email".into()])
                .await?;
        }

        let reopened = SchemaRegistry::open(location).await?;
        let entry = reopened.get_entity("orders").expect("entity persisted");
        assert_eq!(entry.current_version.to_string(), "v2");
        assert_eq!(entry.versions.len(), 2);
        Ok(())
    }
}
