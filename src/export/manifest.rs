//! Export manifest
//!
//! Lists the reference tables that can be cached and the export jobs to run.
//! The built-in manifests cover the usual Nautobot object types; a YAML file
//! can replace them.
//!
//! Example format:
//! ```yaml
//! references:
//!   - name: statuses
//!     query:
//!       api: rest
//!       endpoint: extras/statuses
//! jobs:
//!   - name: devices
//!     query:
//!       api: rest
//!       endpoint: dcim/devices
//!     sourcetype: nautobot:dcim:device
//!     host_field: name
//!     references:
//!       status: statuses
//! ```

use crate::config::ApiStyle;
use crate::etl::QueryDefinition;
use crate::transform::{DEFAULT_BLACKLIST, ReferenceTable, TimestampStyle};
use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One object type to export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    /// Object type, also used for log prefixes and output file names
    pub name: String,
    pub query: QueryDefinition,
    pub sourcetype: String,
    /// Event field used as the envelope host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_field: Option<String>,
    /// Record field → reference table name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, String>,
    /// Top-level fields removed from every event
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub timestamps: TimestampStyle,
}

fn default_blacklist() -> Vec<String> {
    DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect()
}

impl ExportJob {
    pub fn new(
        name: impl Into<String>,
        query: QueryDefinition,
        sourcetype: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            query,
            sourcetype: sourcetype.into(),
            host_field: None,
            references: BTreeMap::new(),
            blacklist: default_blacklist(),
            timestamps: TimestampStyle::default(),
        }
    }

    pub fn with_host_field(mut self, field: impl Into<String>) -> Self {
        self.host_field = Some(field.into());
        self
    }

    /// Resolve `field` through the reference table named `table`
    pub fn with_reference(mut self, field: impl Into<String>, table: impl Into<String>) -> Self {
        self.references.insert(field.into(), table.into());
        self
    }

    pub fn with_blacklist<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.blacklist = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timestamps(mut self, style: TimestampStyle) -> Self {
        self.timestamps = style;
        self
    }

    /// Reference tables this job needs, each named once
    pub fn required_tables(&self) -> BTreeSet<&str> {
        self.references.values().map(String::as_str).collect()
    }
}

/// Reference tables plus the jobs to run, in order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportManifest {
    #[serde(default)]
    pub references: Vec<ReferenceTable>,
    pub jobs: Vec<ExportJob>,
}

impl ExportManifest {
    /// Built-in manifest for the given query API style
    pub fn for_api(api: ApiStyle) -> Self {
        match api {
            ApiStyle::Rest => Self::default_rest(),
            ApiStyle::Graphql => Self::default_graphql(),
        }
    }

    /// REST list endpoints with reference resolution.
    ///
    /// Sites live in the `locations` job; `dcim/sites` is gone since Nautobot 2.
    pub fn default_rest() -> Self {
        let references = vec![
            ReferenceTable::new("statuses", QueryDefinition::rest("extras/statuses"))
                .with_secondary_key("slug"),
            ReferenceTable::new("roles", QueryDefinition::rest("extras/roles")),
            ReferenceTable::new("tenants", QueryDefinition::rest("tenancy/tenants")),
            ReferenceTable::new("tags", QueryDefinition::rest("extras/tags"))
                .with_secondary_key("slug"),
            ReferenceTable::new("locations", QueryDefinition::rest("dcim/locations")),
            ReferenceTable::new(
                "dynamic_groups",
                QueryDefinition::rest("extras/dynamic-groups"),
            ),
        ];

        let job = |name: &str, endpoint: &str, sourcetype: &str| {
            ExportJob::new(name, QueryDefinition::rest(endpoint), sourcetype)
        };

        let jobs = vec![
            job("devices", "dcim/devices", "nautobot:dcim:device")
                .with_host_field("name")
                .with_reference("status", "statuses")
                .with_reference("role", "roles")
                .with_reference("tenant", "tenants")
                .with_reference("tags", "tags")
                .with_reference("location", "locations"),
            job("interfaces", "dcim/interfaces", "nautobot:dcim:interface")
                .with_reference("status", "statuses")
                .with_reference("tags", "tags"),
            job("ip_addresses", "ipam/ip-addresses", "nautobot:ipam:ip_address")
                .with_reference("status", "statuses")
                .with_reference("role", "roles")
                .with_reference("tenant", "tenants")
                .with_reference("tags", "tags"),
            job("prefixes", "ipam/prefixes", "nautobot:ipam:prefix")
                .with_reference("status", "statuses")
                .with_reference("role", "roles")
                .with_reference("tenant", "tenants")
                .with_reference("tags", "tags")
                .with_reference("location", "locations"),
            job("vrfs", "ipam/vrfs", "nautobot:ipam:vrf")
                .with_reference("tenant", "tenants")
                .with_reference("tags", "tags"),
            job("vlans", "ipam/vlans", "nautobot:ipam:vlan")
                .with_reference("status", "statuses")
                .with_reference("role", "roles")
                .with_reference("tenant", "tenants")
                .with_reference("tags", "tags")
                .with_reference("location", "locations"),
            job("locations", "dcim/locations", "nautobot:dcim:location")
                .with_reference("status", "statuses")
                .with_reference("tenant", "tenants")
                .with_reference("tags", "tags"),
            job("device_types", "dcim/device-types", "nautobot:dcim:device_type")
                .with_reference("tags", "tags"),
            job("tags", "extras/tags", "nautobot:extras:tag"),
            job(
                "custom_fields",
                "extras/custom-fields",
                "nautobot:extras:custom_field",
            ),
            job("statuses", "extras/statuses", "nautobot:extras:status"),
        ];

        Self { references, jobs }
    }

    /// GraphQL queries that select display names directly, so no reference
    /// tables are needed
    pub fn default_graphql() -> Self {
        let job = |name: &str, query: &str, sourcetype: &str| {
            ExportJob::new(name, QueryDefinition::graphql(name, query), sourcetype)
                .with_blacklist(Vec::<String>::new())
        };

        let jobs = vec![
            job("devices", DEVICE_QUERY, "nautobot:dcim:device").with_host_field("name"),
            job("ip_addresses", IP_ADDRESS_QUERY, "nautobot:ipam:ip_address"),
            job("prefixes", PREFIX_QUERY, "nautobot:ipam:prefix"),
            job("vlans", VLAN_QUERY, "nautobot:ipam:vlan"),
            job("vrfs", VRF_QUERY, "nautobot:ipam:vrf"),
        ];

        Self {
            references: Vec::new(),
            jobs,
        }
    }

    /// Read manifest from YAML file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read export manifest: {}", path.display()))?;

        let manifest: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse export manifest YAML: {}", path.display()))?;

        manifest.validate()?;
        Ok(manifest)
    }

    /// Write manifest to YAML file
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)
            .with_context(|| "Failed to serialize export manifest to YAML")?;

        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write export manifest: {}", path.display()))?;

        Ok(())
    }

    /// Check names are unique and every mapped reference table exists
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            bail!("Export manifest has no jobs");
        }

        let mut tables = BTreeSet::new();
        for table in &self.references {
            if !tables.insert(table.name.as_str()) {
                bail!("Duplicate reference table '{}'", table.name);
            }
        }

        let mut names = BTreeSet::new();
        for job in &self.jobs {
            if job.name.trim().is_empty() {
                bail!("Export job with an empty name");
            }
            if !names.insert(job.name.as_str()) {
                bail!("Duplicate export job '{}'", job.name);
            }
            for (field, table) in &job.references {
                if !tables.contains(table.as_str()) {
                    bail!(
                        "Job '{}' maps field '{}' to unknown reference table '{}'",
                        job.name,
                        field,
                        table
                    );
                }
            }
        }

        Ok(())
    }

    /// Jobs to run, in manifest order.
    ///
    /// An empty `only` selects every job; otherwise each name must exist.
    pub fn select(&self, only: &[String]) -> Result<Vec<&ExportJob>> {
        if only.is_empty() {
            return Ok(self.jobs.iter().collect());
        }

        if let Some(unknown) = only.iter().find(|name| self.job(name).is_none()) {
            bail!(
                "Unknown export job '{}' (available: {})",
                unknown,
                self.job_names().join(", ")
            );
        }

        Ok(self
            .jobs
            .iter()
            .filter(|job| only.iter().any(|name| name == &job.name))
            .collect())
    }

    pub fn job(&self, name: &str) -> Option<&ExportJob> {
        self.jobs.iter().find(|job| job.name == name)
    }

    pub fn table(&self, name: &str) -> Option<&ReferenceTable> {
        self.references.iter().find(|table| table.name == name)
    }

    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|job| job.name.as_str()).collect()
    }
}

const DEVICE_QUERY: &str = r#"query DeviceInventory($limit: Int!, $offset: Int!) {
  devices(limit: $limit, offset: $offset) {
    id
    name
    serial
    asset_tag
    status { name }
    role { name }
    device_type { model manufacturer { name } }
    platform { name }
    location { name }
    rack { name }
    position
    face
    tenant { name }
    cluster { name }
    primary_ip4 { address }
    primary_ip6 { address }
    tags { name }
    comments
    created
    last_updated
  }
}"#;

const IP_ADDRESS_QUERY: &str = r#"query IpAddressInventory($limit: Int!, $offset: Int!) {
  ip_addresses(limit: $limit, offset: $offset) {
    id
    address
    status { name }
    role { name }
    dns_name
    description
    tenant { name }
    tags { name }
    created
    last_updated
    interfaces { name device { name } }
  }
}"#;

const PREFIX_QUERY: &str = r#"query PrefixInventory($limit: Int!, $offset: Int!) {
  prefixes(limit: $limit, offset: $offset) {
    id
    prefix
    type
    status { name }
    role { name }
    description
    location { name }
    tenant { name }
    vlan { name vid }
    tags { name }
    created
    last_updated
  }
}"#;

const VLAN_QUERY: &str = r#"query VlanInventory($limit: Int!, $offset: Int!) {
  vlans(limit: $limit, offset: $offset) {
    id
    name
    vid
    status { name }
    role { name }
    description
    location { name }
    vlan_group { name }
    tenant { name }
    tags { name }
    created
    last_updated
  }
}"#;

const VRF_QUERY: &str = r#"query VrfInventory($limit: Int!, $offset: Int!) {
  vrfs(limit: $limit, offset: $offset) {
    id
    name
    rd
    tenant { name }
    description
    tags { name }
    created
    last_updated
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_manifests_are_valid() {
        ExportManifest::default_rest().validate().unwrap();
        ExportManifest::default_graphql().validate().unwrap();
    }

    #[test]
    fn test_default_rest_jobs() {
        let manifest = ExportManifest::default_rest();
        assert_eq!(
            manifest.job_names(),
            vec![
                "devices",
                "interfaces",
                "ip_addresses",
                "prefixes",
                "vrfs",
                "vlans",
                "locations",
                "device_types",
                "tags",
                "custom_fields",
                "statuses"
            ]
        );

        let devices = manifest.job("devices").unwrap();
        assert_eq!(devices.sourcetype, "nautobot:dcim:device");
        assert_eq!(devices.host_field.as_deref(), Some("name"));
        assert_eq!(devices.references.get("status").unwrap(), "statuses");
        assert!(devices.blacklist.contains(&"custom_fields".to_string()));
    }

    #[test]
    fn test_sites_export_through_locations() {
        let manifest = ExportManifest::default_rest();
        assert!(manifest.job("sites").is_none());

        let locations = manifest.job("locations").unwrap();
        assert_eq!(locations.query, QueryDefinition::rest("dcim/locations"));
        assert_eq!(locations.sourcetype, "nautobot:dcim:location");
        assert_eq!(locations.references.get("status").unwrap(), "statuses");
    }

    #[test]
    fn test_graphql_queries_use_paging_variables() {
        let manifest = ExportManifest::for_api(ApiStyle::Graphql);
        for job in &manifest.jobs {
            match &job.query {
                QueryDefinition::Graphql { root_field, query } => {
                    assert_eq!(root_field, &job.name);
                    assert!(query.contains(&format!("{}(limit: $limit, offset: $offset)", job.name)));
                }
                other => panic!("unexpected query {}", other),
            }
            assert!(job.required_tables().is_empty());
        }
    }

    #[test]
    fn test_required_tables_are_deduplicated() {
        let job = ExportJob::new("x", QueryDefinition::rest("x"), "x")
            .with_reference("status", "statuses")
            .with_reference("oper_status", "statuses")
            .with_reference("tenant", "tenants");
        assert_eq!(
            job.required_tables().into_iter().collect::<Vec<_>>(),
            vec!["statuses", "tenants"]
        );
    }

    #[test]
    fn test_select() {
        let manifest = ExportManifest::default_rest();
        assert_eq!(manifest.select(&[]).unwrap().len(), manifest.jobs.len());

        let selected = manifest
            .select(&["vlans".to_string(), "devices".to_string()])
            .unwrap();
        let names: Vec<_> = selected.iter().map(|job| job.name.as_str()).collect();
        assert_eq!(names, vec!["devices", "vlans"]);

        let err = manifest.select(&["racks".to_string()]).unwrap_err();
        assert!(err.to_string().contains("racks"));
    }

    #[test]
    fn test_validate_rejects_unknown_table() {
        let manifest = ExportManifest {
            references: Vec::new(),
            jobs: vec![
                ExportJob::new("devices", QueryDefinition::rest("dcim/devices"), "d")
                    .with_reference("status", "statuses"),
            ],
        };
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("unknown reference table 'statuses'"));
    }

    #[test]
    fn test_validate_rejects_duplicate_jobs() {
        let job = ExportJob::new("vlans", QueryDefinition::rest("ipam/vlans"), "v");
        let manifest = ExportManifest {
            references: Vec::new(),
            jobs: vec![job.clone(), job],
        };
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_parse_yaml_with_defaults() {
        let yaml = r#"
references:
  - name: statuses
    query:
      api: rest
      endpoint: extras/statuses
jobs:
  - name: devices
    query:
      api: rest
      endpoint: dcim/devices
    sourcetype: nautobot:dcim:device
    references:
      status: statuses
  - name: vrfs
    query:
      api: graphql
      root_field: vrfs
      query: "query ($limit: Int!, $offset: Int!) { vrfs(limit: $limit, offset: $offset) { name } }"
    sourcetype: nautobot:ipam:vrf
    blacklist: []
    timestamps: epoch_seconds
"#;
        let manifest: ExportManifest = serde_yaml::from_str(yaml).unwrap();
        manifest.validate().unwrap();

        let devices = manifest.job("devices").unwrap();
        assert_eq!(manifest.table("statuses").unwrap().value_field, "name");
        assert_eq!(devices.blacklist, default_blacklist());
        assert_eq!(devices.timestamps, TimestampStyle::Iso8601);

        let vrfs = manifest.job("vrfs").unwrap();
        assert!(vrfs.blacklist.is_empty());
        assert_eq!(vrfs.timestamps, TimestampStyle::EpochSeconds);
        assert!(matches!(vrfs.query, QueryDefinition::Graphql { .. }));
    }

    #[test]
    fn test_write_and_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manifest/export.yml");

        let manifest = ExportManifest::default_rest();
        manifest.write(&path).unwrap();

        assert_eq!(ExportManifest::read(&path).unwrap(), manifest);
    }
}
