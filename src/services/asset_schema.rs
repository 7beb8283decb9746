//! Column table shared by the CSV import and export of assets.
//!
//! Each row of [`ASSET_FIELDS`] ties an asset attribute to its column label in
//! spreadsheets and to the coercion applied to imported cells.

use std::collections::HashSet;

use anyhow::{bail, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AssetField {
    Id,
    Hostname,
    NetworkIp,
    InnerIp,
    Port,
    IsActive,
    Project,
    Business,
    LoginUser,
    OsRelease,
    CpuModel,
    Memory,
    Disk,
    SerialNumber,
    Remark,
    CreatedAt,
    UpdatedAt,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoercionKind {
    Identifier,
    Text,
    Boolean,
    Port,
    ProjectRef,
    BusinessRef,
    LoginUserRef,
    Timestamp,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub field: AssetField,
    pub name: &'static str,
    pub label: &'static str,
    pub kind: CoercionKind,
}

const fn spec(
    field: AssetField,
    name: &'static str,
    label: &'static str,
    kind: CoercionKind,
) -> FieldSpec {
    FieldSpec {
        field,
        name,
        label,
        kind,
    }
}

pub const ASSET_FIELDS: &[FieldSpec] = &[
    spec(AssetField::Id, "id", "ID", CoercionKind::Identifier),
    spec(AssetField::Hostname, "hostname", "Hostname", CoercionKind::Text),
    spec(AssetField::NetworkIp, "network_ip", "Public IP", CoercionKind::Text),
    spec(AssetField::InnerIp, "inner_ip", "Inner IP", CoercionKind::Text),
    spec(AssetField::Port, "port", "SSH Port", CoercionKind::Port),
    spec(AssetField::IsActive, "is_active", "Active", CoercionKind::Boolean),
    spec(AssetField::Project, "project", "Project", CoercionKind::ProjectRef),
    spec(AssetField::Business, "business", "Business", CoercionKind::BusinessRef),
    spec(AssetField::LoginUser, "login_user", "Login User", CoercionKind::LoginUserRef),
    spec(AssetField::OsRelease, "os_release", "OS Release", CoercionKind::Text),
    spec(AssetField::CpuModel, "cpu_model", "CPU", CoercionKind::Text),
    spec(AssetField::Memory, "memory", "Memory", CoercionKind::Text),
    spec(AssetField::Disk, "disk", "Disk", CoercionKind::Text),
    spec(AssetField::SerialNumber, "serial_number", "Serial Number", CoercionKind::Text),
    spec(AssetField::Remark, "remark", "Remark", CoercionKind::Text),
    spec(AssetField::CreatedAt, "created_at", "Created At", CoercionKind::Timestamp),
    spec(AssetField::UpdatedAt, "updated_at", "Updated At", CoercionKind::Timestamp),
];

/// Fields that travel through CSV files. `created_at` stays server side.
pub fn transferable_fields() -> impl Iterator<Item = &'static FieldSpec> {
    ASSET_FIELDS
        .iter()
        .filter(|spec| spec.field != AssetField::CreatedAt)
}

/// Resolve a header cell to its field. Unknown labels yield `None`.
pub fn field_for_label(label: &str) -> Option<&'static FieldSpec> {
    let label = label.trim();
    transferable_fields().find(|spec| spec.label == label)
}

/// Startup check on the column table.
pub fn validate() -> Result<()> {
    let mut names = HashSet::new();
    let mut labels = HashSet::new();
    for spec in ASSET_FIELDS {
        if !names.insert(spec.name) {
            bail!("duplicate asset field name {}", spec.name);
        }
        if !labels.insert(spec.label) {
            bail!("duplicate asset field label {}", spec.label);
        }
    }

    let identifiers = ASSET_FIELDS
        .iter()
        .filter(|spec| spec.kind == CoercionKind::Identifier)
        .count();
    if identifiers != 1 {
        bail!("asset fields need exactly one identifier, found {}", identifiers);
    }
    Ok(())
}

/// Trimmed text, `None` when blank.
pub fn clean_text(raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `TRUE`, `true` and `1` are true; any other non-blank value is false.
pub fn coerce_bool(raw: &str) -> Option<bool> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    Some(matches!(value, "TRUE" | "true" | "1"))
}

/// Parsed port, or `default_port` when the cell holds something else.
pub fn coerce_port(raw: &str, default_port: i32) -> Option<i32> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.parse::<i32>().unwrap_or(default_port))
}

/// Nonzero id from the `ID` column; anything else means "no id".
pub fn parse_identifier(raw: &str) -> Option<i32> {
    raw.trim().parse::<i32>().ok().filter(|id| *id != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_valid() {
        validate().expect("asset field table should validate");
    }

    #[test]
    fn test_created_at_is_not_transferable() {
        assert!(transferable_fields().all(|spec| spec.field != AssetField::CreatedAt));
        assert!(field_for_label("Created At").is_none());
        assert_eq!(
            field_for_label("Updated At").map(|spec| spec.field),
            Some(AssetField::UpdatedAt)
        );
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(
            field_for_label(" Hostname ").map(|spec| spec.field),
            Some(AssetField::Hostname)
        );
        assert!(field_for_label("hostname").is_none());
        assert!(field_for_label("Rack").is_none());
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(coerce_bool("TRUE"), Some(true));
        assert_eq!(coerce_bool("true"), Some(true));
        assert_eq!(coerce_bool(" 1 "), Some(true));
        assert_eq!(coerce_bool("yes"), Some(false));
        assert_eq!(coerce_bool("True"), Some(false));
        assert_eq!(coerce_bool("0"), Some(false));
        assert_eq!(coerce_bool("  "), None);
    }

    #[test]
    fn test_port_coercion() {
        assert_eq!(coerce_port("2222", 22), Some(2222));
        assert_eq!(coerce_port("ssh", 22), Some(22));
        assert_eq!(coerce_port("", 22), None);
    }

    #[test]
    fn test_identifier_parsing() {
        assert_eq!(parse_identifier("12"), Some(12));
        assert_eq!(parse_identifier("0"), None);
        assert_eq!(parse_identifier(""), None);
        assert_eq!(parse_identifier("abc"), None);
    }
}
