//! Schema loaders.
//!
//! XSD files go through the DataSet-dialect reader in [`xsd`]; JSON and YAML
//! files deserialize the schema model directly.

pub mod xsd;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::schema::Schema;
use crate::error::{Result, Xsd2DbError};

const KNOWN_EXTENSIONS: &[&str] = &["xsd", "json", "yaml", "yml"];

/// Source format of a schema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xsd,
    Json,
    Yaml,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Self {
        match extension(path).as_deref() {
            Some("json") => SourceFormat::Json,
            Some("yaml") | Some("yml") => SourceFormat::Yaml,
            _ => SourceFormat::Xsd,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Resolve the file a schema argument names. `.xsd` is appended when the
/// path has no recognised extension.
pub fn resolve_schema_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    match extension(path) {
        Some(ext) if KNOWN_EXTENSIONS.contains(&ext.as_str()) => path.to_path_buf(),
        _ => {
            let mut name = path.as_os_str().to_os_string();
            name.push(".xsd");
            PathBuf::from(name)
        }
    }
}

/// Load a schema from `path`.
pub fn load_schema(path: impl AsRef<Path>) -> Result<Schema> {
    let path = resolve_schema_path(path);
    if !path.is_file() {
        return Err(Xsd2DbError::SchemaNotFound(path));
    }

    let text = std::fs::read_to_string(&path)?;
    let format = SourceFormat::from_path(&path);
    debug!("Loading {:?} schema from {}", format, path.display());

    let schema = match format {
        SourceFormat::Xsd => xsd::parse(&text)?,
        SourceFormat::Json => serde_json::from_str(&text)?,
        SourceFormat::Yaml => serde_yaml::from_str(&text)?,
    };

    info!(
        "Loaded schema {} ({} tables, {} relations)",
        schema.name,
        schema.tables.len(),
        schema.relations.len()
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::fixtures::master_detail;
    use std::io::Write;

    #[test]
    fn test_resolve_appends_xsd() {
        assert_eq!(resolve_schema_path("orders"), PathBuf::from("orders.xsd"));
        assert_eq!(resolve_schema_path("orders.v2"), PathBuf::from("orders.v2.xsd"));
        assert_eq!(resolve_schema_path("orders.XSD"), PathBuf::from("orders.XSD"));
        assert_eq!(resolve_schema_path("orders.yml"), PathBuf::from("orders.yml"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_schema(dir.path().join("nothing")).unwrap_err();
        match err {
            Xsd2DbError::SchemaNotFound(path) => assert!(path.ends_with("nothing.xsd")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_json_and_yaml() {
        let schema = master_detail();
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("model.json");
        std::fs::write(&json_path, serde_json::to_string(&schema).unwrap()).unwrap();
        assert_eq!(load_schema(&json_path).unwrap(), schema);

        let yaml_path = dir.path().join("model.yaml");
        std::fs::write(&yaml_path, serde_yaml::to_string(&schema).unwrap()).unwrap();
        assert_eq!(load_schema(&yaml_path).unwrap(), schema);
    }

    #[test]
    fn test_load_xsd_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("tiny.xsd")).unwrap();
        file.write_all(
            br#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns:msdata="urn:schemas-microsoft-com:xml-msdata">
                  <xs:element name="Tiny" msdata:IsDataSet="true">
                    <xs:complexType>
                      <xs:choice maxOccurs="unbounded">
                        <xs:element name="Item">
                          <xs:complexType>
                            <xs:sequence>
                              <xs:element name="Id" type="xs:int" />
                            </xs:sequence>
                          </xs:complexType>
                        </xs:element>
                      </xs:choice>
                    </xs:complexType>
                  </xs:element>
                </xs:schema>"#,
        )
        .unwrap();

        let schema = load_schema(dir.path().join("tiny")).unwrap();
        assert_eq!(schema.name, "Tiny");
        assert_eq!(schema.tables[0].name, "Item");
    }

    #[test]
    fn test_malformed_json_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_schema(&path).unwrap_err().exit_code(), 1);
    }
}
