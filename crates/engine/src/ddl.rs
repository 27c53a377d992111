//! Namespace and table lifecycle (§4.9): create/list/describe/drop table,
//! drop namespace. Table creation is idempotent unless the caller opts out
//! with `if_not_exists=false` (§3 Lifecycle).

use crate::engine::Engine;
use crate::schema_bridge::full_schema;
use acidlake_core::{
    CreateTableRequest, CreateTableResponseData, DescribeTableRequest, DescribeTableResponseData,
    DropNamespaceRequest, DropNamespaceResponseData, DropTableRequest, DropTableResponseData,
    EngineError, EngineResult, ListTablesRequest, ListTablesResponseData, TableDescription,
};

impl Engine {
    pub async fn create_table(&self, req: &CreateTableRequest) -> EngineResult<CreateTableResponseData> {
        let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
        self.catalog.create_namespace(&ident.catalog_namespace()).await?;
        let created = self.catalog.create_table(&ident, &req.schema).await?;

        if !created && !req.if_not_exists {
            return Err(EngineError::table_exists(ident.catalog_name()));
        }

        Ok(CreateTableResponseData {
            table_created: created,
            table_existed: !created,
        })
    }

    pub async fn list_tables(&self, req: &ListTablesRequest) -> EngineResult<ListTablesResponseData> {
        let tables = self.catalog.list_tables(&req.tenant_id, &req.namespace).await?;
        Ok(ListTablesResponseData { tables })
    }

    pub async fn describe_table(&self, req: &DescribeTableRequest) -> EngineResult<DescribeTableResponseData> {
        let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
        let table = self
            .catalog
            .load_table(&ident)
            .await?
            .ok_or_else(|| EngineError::describe(format!("table {} does not exist", ident.catalog_name())))?;

        let history = table.history().await?;
        let current_snapshot_id = history.last().map(|s| s.snapshot_id);
        let file_count = table.plan_files().await?.len() as u64;

        Ok(DescribeTableResponseData {
            description: TableDescription {
                schema: full_schema(table.schema()),
                current_snapshot_id,
                file_count: Some(file_count),
            },
        })
    }

    pub async fn drop_table(&self, req: &DropTableRequest) -> EngineResult<DropTableResponseData> {
        let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
        let existed = self.catalog.load_table(&ident).await?.is_some();
        if !existed {
            return Ok(DropTableResponseData {
                table_dropped: false,
                table_existed: false,
            });
        }

        let dropped = match self.catalog.drop_table(&ident, true).await {
            Ok(dropped) => dropped,
            Err(_) => {
                tracing::warn!(table = %ident.catalog_name(), "catalog rejected purge, retrying without it");
                self.catalog.drop_table(&ident, false).await?
            }
        };

        self.caches.lock().invalidate_metadata(ident.catalog_name());
        Ok(DropTableResponseData {
            table_dropped: dropped,
            table_existed: true,
        })
    }

    pub async fn drop_namespace(&self, req: &DropNamespaceRequest) -> EngineResult<DropNamespaceResponseData> {
        let dropped = self.catalog.drop_namespace(&req.tenant_id, &req.namespace).await?;
        Ok(DropNamespaceResponseData {
            namespace_dropped: dropped,
            namespace_existed: dropped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_exists_error_code_matches_spec() {
        assert_eq!(EngineError::table_exists("t").code(), "TABLE_EXISTS");
    }
}
