//! Reader for the DataSet dialect of XML Schema.
//!
//! A dataset element (marked `msdata:IsDataSet="true"`) holds one child
//! element per table. Each table's sequence elements and attributes are its
//! columns. Keys come from `xs:key` and from `xs:unique` marked
//! `msdata:PrimaryKey="true"`. Relations come from `xs:keyref` and from
//! `msdata:Relationship` annotations.
//!
//! Column types are taken from `msdata:DataType` when present, otherwise
//! from the XSD built-in type at the root of the column's type chain. A type
//! that maps to nothing in [`ColumnType`] leaves the column unresolved; the
//! validator then rejects its table.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::core::schema::{Column, ColumnType, Relation, Schema, Table};
use crate::error::{Result, Xsd2DbError};

const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";
const MSDATA_NS: &str = "urn:schemas-microsoft-com:xml-msdata";

/// Name DataSet uses when the schema has no dataset element.
const DEFAULT_DATASET_NAME: &str = "NewDataSet";

const MAX_TYPE_DEPTH: usize = 16;

/// Parse XSD text into a schema model.
pub fn parse(text: &str) -> Result<Schema> {
    let doc = Document::parse(text).map_err(|e| Xsd2DbError::SchemaFormat(e.to_string()))?;
    let root = doc.root_element();
    if !is_xs(root, "schema") {
        return Err(Xsd2DbError::SchemaFormat(format!(
            "root element <{}> is not xs:schema",
            root.tag_name().name()
        )));
    }
    Reader::new(root).read()
}

fn is_xs(node: Node, name: &str) -> bool {
    node.is_element() && node.tag_name().namespace() == Some(XS_NS) && node.tag_name().name() == name
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn local_name(qname: &str) -> &str {
    match qname.rfind(':') {
        Some(i) => &qname[i + 1..],
        None => qname,
    }
}

fn msdata<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute((MSDATA_NS, name))
}

fn required<'a>(node: Node<'a, '_>, name: &str, what: &str) -> Result<&'a str> {
    node.attribute(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Xsd2DbError::SchemaFormat(format!("{} without a '{}' attribute", what, name)))
}

/// Table named by a selector such as `.//mstns:Master`.
fn selector_table(xpath: &str) -> &str {
    let path = xpath.trim().trim_start_matches('.').trim_start_matches('/');
    local_name(path.rsplit('/').next().unwrap_or(path))
}

/// Column named by a field such as `@Id` or `mstns:Id`.
fn field_column(xpath: &str) -> &str {
    local_name(xpath.trim().trim_start_matches('@'))
}

/// Columns listed in an `msdata:Relationship` key attribute.
fn key_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Map a .NET type name (`System.Guid, mscorlib, ...`) to a column type.
fn clr_type(name: &str) -> Option<ColumnType> {
    let name = name.split(',').next().unwrap_or(name).trim();
    let name = name.strip_prefix("System.").unwrap_or(name);
    let column_type = match name {
        "Int64" => ColumnType::Int64,
        "UInt64" => ColumnType::UInt64,
        "Int32" => ColumnType::Int32,
        "UInt32" => ColumnType::UInt32,
        "Int16" => ColumnType::Int16,
        "UInt16" => ColumnType::UInt16,
        "Byte" => ColumnType::Byte,
        "Boolean" => ColumnType::Boolean,
        "Char" => ColumnType::Char,
        "DateTime" => ColumnType::DateTime,
        "Double" => ColumnType::Double,
        "Decimal" => ColumnType::Decimal,
        "Guid" => ColumnType::Guid,
        "String" => ColumnType::String,
        "TimeSpan" => ColumnType::TimeSpan,
        "Byte[]" => ColumnType::Binary,
        "Char[]" => ColumnType::CharBlob,
        _ => return None,
    };
    Some(column_type)
}

/// Map an XSD built-in type to the column type DataSet would give it.
fn builtin_type(name: &str) -> Option<ColumnType> {
    let column_type = match name {
        "long" | "integer" | "negativeInteger" | "nonPositiveInteger" => ColumnType::Int64,
        "unsignedLong" | "nonNegativeInteger" | "positiveInteger" => ColumnType::UInt64,
        "int" => ColumnType::Int32,
        "unsignedInt" => ColumnType::UInt32,
        "short" => ColumnType::Int16,
        "unsignedShort" => ColumnType::UInt16,
        "unsignedByte" => ColumnType::Byte,
        "boolean" => ColumnType::Boolean,
        "dateTime" | "date" | "time" => ColumnType::DateTime,
        "double" => ColumnType::Double,
        "decimal" => ColumnType::Decimal,
        "duration" => ColumnType::TimeSpan,
        "base64Binary" | "hexBinary" => ColumnType::Binary,
        "string" | "normalizedString" | "token" | "Name" | "NCName" | "NMTOKEN" | "ID"
        | "IDREF" | "language" | "QName" | "ENTITY" => ColumnType::String,
        _ => return None,
    };
    Some(column_type)
}

/// A column's simple type, followed back to its built-in base.
struct SimpleTypeInfo {
    /// Type as written in the document, for diagnostics.
    declared: String,
    /// Local name of the XSD built-in at the root of the chain.
    builtin: Option<String>,
    max_length: i32,
}

/// A key or unique constraint.
struct KeyDecl {
    table: String,
    columns: Vec<String>,
    primary: bool,
}

struct Reader<'a, 'input> {
    root: Node<'a, 'input>,
    elements: HashMap<&'a str, Node<'a, 'input>>,
    complex_types: HashMap<&'a str, Node<'a, 'input>>,
    simple_types: HashMap<&'a str, Node<'a, 'input>>,
}

impl<'a, 'input> Reader<'a, 'input> {
    fn new(root: Node<'a, 'input>) -> Self {
        let mut elements = HashMap::new();
        let mut complex_types = HashMap::new();
        let mut simple_types = HashMap::new();

        for child in root.children().filter(Node::is_element) {
            let Some(name) = child.attribute("name") else {
                continue;
            };
            if is_xs(child, "element") {
                elements.insert(name, child);
            } else if is_xs(child, "complexType") {
                complex_types.insert(name, child);
            } else if is_xs(child, "simpleType") {
                simple_types.insert(name, child);
            }
        }

        Self {
            root,
            elements,
            complex_types,
            simple_types,
        }
    }

    fn read(&self) -> Result<Schema> {
        let (name, table_elements) = self.dataset()?;
        let mut schema = Schema::new(name);

        for element in table_elements {
            let element = self.resolve_ref(element)?;
            if let Some(complex) = self.complex_type_of(element) {
                self.read_table(element, complex, &mut schema.tables, 0)?;
            }
        }

        let keys = self.read_keys()?;
        self.apply_primary_keys(&mut schema, &keys)?;
        self.read_relations(&mut schema, &keys)?;

        debug!(
            "Parsed XSD schema {}: {} tables, {} relations",
            schema.name,
            schema.tables.len(),
            schema.relations.len()
        );
        Ok(schema)
    }

    /// Schema name and the elements that declare its tables.
    fn dataset(&self) -> Result<(String, Vec<Node<'a, 'input>>)> {
        let top: Vec<_> = self
            .root
            .children()
            .filter(|n| is_xs(*n, "element"))
            .collect();
        if top.is_empty() {
            return Err(Xsd2DbError::SchemaFormat(
                "schema declares no elements".to_string(),
            ));
        }

        let marked = top
            .iter()
            .copied()
            .find(|n| msdata(*n, "IsDataSet").map(is_true).unwrap_or(false));
        let dataset = match marked {
            Some(element) => Some(element),
            None => top.iter().copied().find(|n| self.contains_tables(*n)),
        };

        match dataset {
            Some(element) => {
                let name = required(element, "name", "dataset element")?;
                let tables = self
                    .complex_type_of(element)
                    .map(|complex| self.particles(complex))
                    .unwrap_or_default();
                Ok((name.to_string(), tables))
            }
            None => {
                let name = self
                    .root
                    .attribute("id")
                    .filter(|id| !id.trim().is_empty())
                    .unwrap_or(DEFAULT_DATASET_NAME);
                Ok((name.to_string(), top))
            }
        }
    }

    fn contains_tables(&self, element: Node<'a, 'input>) -> bool {
        self.complex_type_of(element)
            .map(|complex| {
                self.particles(complex).into_iter().any(|child| {
                    self.resolve_ref(child)
                        .map(|c| self.complex_type_of(c).is_some())
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    fn resolve_ref(&self, element: Node<'a, 'input>) -> Result<Node<'a, 'input>> {
        match element.attribute("ref") {
            Some(reference) => self
                .elements
                .get(local_name(reference))
                .copied()
                .ok_or_else(|| {
                    Xsd2DbError::SchemaFormat(format!("element ref '{}' is not declared", reference))
                }),
            None => Ok(element),
        }
    }

    fn complex_type_of(&self, element: Node<'a, 'input>) -> Option<Node<'a, 'input>> {
        if let Some(inline) = element.children().find(|n| is_xs(*n, "complexType")) {
            return Some(inline);
        }
        element
            .attribute("type")
            .and_then(|t| self.complex_types.get(local_name(t)).copied())
    }

    /// Element particles of a complex type, flattening nested groups.
    fn particles(&self, container: Node<'a, 'input>) -> Vec<Node<'a, 'input>> {
        let mut out = Vec::new();
        collect_particles(container, &mut out);
        out
    }

    fn read_table(
        &self,
        element: Node<'a, 'input>,
        complex: Node<'a, 'input>,
        tables: &mut Vec<Table>,
        depth: usize,
    ) -> Result<()> {
        let name = required(element, "name", "table element")?;
        if depth > MAX_TYPE_DEPTH {
            return Err(Xsd2DbError::SchemaFormat(format!(
                "table {} is nested too deeply",
                name
            )));
        }

        let index = tables.len();
        tables.push(Table::new(name));

        for child in self.particles(complex) {
            let child = self.resolve_ref(child)?;
            match self.complex_type_of(child) {
                Some(nested) => self.read_table(child, nested, tables, depth + 1)?,
                None => {
                    let column = self.read_column(child, name, false)?;
                    tables[index].columns.push(column);
                }
            }
        }

        for attribute in complex.children().filter(|n| is_xs(*n, "attribute")) {
            if attribute.attribute("use") == Some("prohibited") {
                continue;
            }
            let column = self.read_column(attribute, name, true)?;
            tables[index].columns.push(column);
        }

        Ok(())
    }

    fn read_column(&self, node: Node<'a, 'input>, table: &str, is_attribute: bool) -> Result<Column> {
        let name = required(node, "name", &format!("column of table {}", table))?;
        let info = self.simple_type(node)?;

        let resolved = match msdata(node, "DataType") {
            Some(data_type) => clr_type(data_type).ok_or_else(|| data_type.to_string()),
            None => info
                .builtin
                .as_deref()
                .and_then(builtin_type)
                .ok_or_else(|| info.declared.clone()),
        };

        let column = match resolved {
            Ok(column_type) => Column::new(name, column_type),
            Err(source_type) => {
                warn!(
                    "Column {}.{} has unsupported type {}",
                    table, name, source_type
                );
                Column::unresolved(name, source_type)
            }
        };

        let nullable = match msdata(node, "AllowDBNull") {
            Some(value) => is_true(value),
            None if is_attribute => node.attribute("use") != Some("required"),
            None => {
                node.attribute("minOccurs").map(str::trim) == Some("0")
                    || node.attribute("nillable").map(is_true).unwrap_or(false)
            }
        };

        Ok(column.with_max_length(info.max_length).nullable(nullable))
    }

    fn simple_type(&self, node: Node<'a, 'input>) -> Result<SimpleTypeInfo> {
        if let Some(inline) = node.children().find(|n| is_xs(*n, "simpleType")) {
            return self.restriction(inline, 0);
        }
        match node.attribute("type") {
            Some(qname) => self.named_type(node, qname, 0),
            None => Ok(SimpleTypeInfo {
                declared: "xs:string".to_string(),
                builtin: Some("string".to_string()),
                max_length: -1,
            }),
        }
    }

    fn named_type(&self, context: Node<'a, 'input>, qname: &str, depth: usize) -> Result<SimpleTypeInfo> {
        let local = local_name(qname);
        let namespace = match qname.find(':') {
            Some(i) => context.lookup_namespace_uri(Some(&qname[..i])),
            None => context.lookup_namespace_uri(None),
        };

        if namespace == Some(XS_NS) {
            return Ok(SimpleTypeInfo {
                declared: qname.to_string(),
                builtin: Some(local.to_string()),
                max_length: -1,
            });
        }

        match self.simple_types.get(local) {
            Some(simple) => {
                let mut info = self.restriction(*simple, depth + 1)?;
                info.declared = qname.to_string();
                Ok(info)
            }
            None => Ok(SimpleTypeInfo {
                declared: qname.to_string(),
                builtin: None,
                max_length: -1,
            }),
        }
    }

    fn restriction(&self, simple: Node<'a, 'input>, depth: usize) -> Result<SimpleTypeInfo> {
        if depth > MAX_TYPE_DEPTH {
            return Err(Xsd2DbError::SchemaFormat(
                "simple type derivation is too deep".to_string(),
            ));
        }

        let Some(restriction) = simple.children().find(|n| is_xs(*n, "restriction")) else {
            return Ok(SimpleTypeInfo {
                declared: "xs:simpleType".to_string(),
                builtin: None,
                max_length: -1,
            });
        };

        let mut info = match restriction.attribute("base") {
            Some(base) => self.named_type(restriction, base, depth)?,
            None => match restriction.children().find(|n| is_xs(*n, "simpleType")) {
                Some(inner) => self.restriction(inner, depth + 1)?,
                None => SimpleTypeInfo {
                    declared: "xs:restriction".to_string(),
                    builtin: None,
                    max_length: -1,
                },
            },
        };

        let facet = restriction
            .children()
            .find(|n| is_xs(*n, "maxLength") || is_xs(*n, "length"));
        if let Some(facet) = facet {
            let value = required(facet, "value", "length facet")?;
            info.max_length = value.trim().parse().map_err(|_| {
                Xsd2DbError::SchemaFormat(format!("invalid length facet value '{}'", value))
            })?;
        }

        Ok(info)
    }

    fn read_keys(&self) -> Result<Vec<(&'a str, KeyDecl)>> {
        let mut keys = Vec::new();
        for node in self.root.descendants() {
            let primary = if is_xs(node, "key") {
                msdata(node, "PrimaryKey").map(is_true).unwrap_or(true)
            } else if is_xs(node, "unique") {
                msdata(node, "PrimaryKey").map(is_true).unwrap_or(false)
            } else {
                continue;
            };
            let name = required(node, "name", "key constraint")?;
            let (table, columns) = identity_constraint(node, name)?;
            keys.push((
                name,
                KeyDecl {
                    table,
                    columns,
                    primary,
                },
            ));
        }
        Ok(keys)
    }

    fn apply_primary_keys(&self, schema: &mut Schema, keys: &[(&'a str, KeyDecl)]) -> Result<()> {
        for (name, key) in keys.iter().filter(|(_, k)| k.primary) {
            let table = schema
                .tables
                .iter_mut()
                .find(|t| t.name == key.table)
                .ok_or_else(|| {
                    Xsd2DbError::SchemaFormat(format!(
                        "key {} selects undeclared table {}",
                        name, key.table
                    ))
                })?;
            if table.primary_key.is_none() {
                table.primary_key = Some(key.columns.clone());
            } else {
                debug!("Ignoring second primary key {} on {}", name, table.name);
            }
        }
        Ok(())
    }

    fn read_relations(&self, schema: &mut Schema, keys: &[(&'a str, KeyDecl)]) -> Result<()> {
        for node in self.root.descendants() {
            let relation = if is_xs(node, "keyref") {
                let name = required(node, "name", "keyref")?;
                let refer = local_name(required(node, "refer", "keyref")?);
                let (_, key) = keys.iter().find(|(n, _)| *n == refer).ok_or_else(|| {
                    Xsd2DbError::SchemaFormat(format!(
                        "keyref {} refers to undeclared key {}",
                        name, refer
                    ))
                })?;
                let (child_table, child_columns) = identity_constraint(node, name)?;
                Relation::new(
                    name,
                    key.table.clone(),
                    key.columns.clone(),
                    child_table,
                    child_columns,
                )
            } else if node.is_element()
                && node.tag_name().namespace() == Some(MSDATA_NS)
                && node.tag_name().name() == "Relationship"
            {
                let name = required(node, "name", "msdata:Relationship")?;
                let attr = |key: &str| {
                    msdata(node, key).ok_or_else(|| {
                        Xsd2DbError::SchemaFormat(format!(
                            "relationship {} without msdata:{}",
                            name, key
                        ))
                    })
                };
                Relation::new(
                    name,
                    attr("parent")?,
                    key_list(attr("parentkey")?),
                    attr("child")?,
                    key_list(attr("childkey")?),
                )
            } else {
                continue;
            };

            if schema.relations.iter().any(|r| r.name == relation.name) {
                debug!("Relation {} declared twice; keeping the first", relation.name);
                continue;
            }
            schema.relations.push(relation);
        }
        Ok(())
    }
}

fn collect_particles<'a, 'input>(container: Node<'a, 'input>, out: &mut Vec<Node<'a, 'input>>) {
    for child in container.children().filter(Node::is_element) {
        if is_xs(child, "element") {
            out.push(child);
        } else if is_xs(child, "sequence") || is_xs(child, "choice") || is_xs(child, "all") {
            collect_particles(child, out);
        }
    }
}

/// Table and columns of a key, unique or keyref declaration.
fn identity_constraint(node: Node, name: &str) -> Result<(String, Vec<String>)> {
    let selector = node
        .children()
        .find(|n| is_xs(*n, "selector"))
        .and_then(|s| s.attribute("xpath"))
        .ok_or_else(|| Xsd2DbError::SchemaFormat(format!("constraint {} has no selector", name)))?;

    let columns: Vec<String> = node
        .children()
        .filter(|n| is_xs(*n, "field"))
        .filter_map(|f| f.attribute("xpath"))
        .map(|xpath| field_column(xpath).to_string())
        .collect();

    Ok((selector_table(selector).to_string(), columns))
}
