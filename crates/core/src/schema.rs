//! Table identity and schema types (§3 Data Model).

use serde::{Deserialize, Serialize};

/// User-facing column types recognized by the write/read paths.
///
/// `Decimal` always carries `decimal(38,9)` precision/scale per §3; it is
/// not parameterized because the spec fixes a single decimal shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    String,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
    Date,
    Timestamp,
    Decimal,
    Binary,
    List(Box<ColumnType>),
    Map(Box<ColumnType>, Box<ColumnType>),
    Struct(Vec<FieldDef>),
}

/// One column definition in a table schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

fn default_nullable() -> bool {
    true
}

/// The user-supplied portion of a table schema (system columns are
/// prepended by the write path, never supplied by the caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TableSchema {
    pub fields: Vec<FieldDef>,
}

impl TableSchema {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Fully-qualified table identity: `{tenant_id}_{namespace}.{table}` with
/// hyphens in the tenant id replaced by underscores for identifier
/// compatibility (§3 Table).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdent {
    pub tenant_id: String,
    pub namespace: String,
    pub table: String,
}

impl TableIdent {
    pub fn new(
        tenant_id: impl Into<String>,
        namespace: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            namespace: namespace.into(),
            table: table.into(),
        }
    }

    /// The catalog-facing identifier, e.g. `acme_corp_default.users` for
    /// tenant `acme-corp`, namespace `default`, table `users`.
    pub fn catalog_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.tenant_id.replace('-', "_"),
            self.namespace,
            self.table
        )
    }

    /// The catalog namespace portion alone, e.g. `acme_corp_default`.
    pub fn catalog_namespace(&self) -> String {
        format!("{}_{}", self.tenant_id.replace('-', "_"), self.namespace)
    }
}
