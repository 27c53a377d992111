//! Physical row delete (§4.7): count-match via the read path, then a
//! catalog-native row-level delete. Requires `confirm=true` — the only
//! operation that erases data across every version of a matching row.

use crate::engine::{Deadline, Engine};
use acidlake_core::{
    EngineError, EngineResult, HardDeleteRequest, HardDeleteResponseData,
};
use acidlake_sql::build_catalog_predicate;

impl Engine {
    pub async fn hard_delete(
        &self,
        req: &HardDeleteRequest,
        deadline: Deadline,
    ) -> EngineResult<HardDeleteResponseData> {
        if !req.confirm {
            return Err(EngineError::ConfirmationRequired);
        }

        let ident = Self::ident(&req.tenant_id, &req.namespace, &req.table);
        let Some(mut table) = self.catalog.load_table(&ident).await? else {
            return Ok(HardDeleteResponseData {
                records_deleted: 0,
                files_rewritten: 0,
            });
        };

        let matched = self.run_select(&ident, table.as_ref(), &req.filters).await?;
        if matched.is_empty() {
            return Ok(HardDeleteResponseData {
                records_deleted: 0,
                files_rewritten: 0,
            });
        }

        deadline.check()?;

        let files_before = table.plan_files().await?.len() as u64;

        let mut filters = req.filters.clone();
        filters.push(acidlake_core::Filter {
            field: acidlake_core::COL_TENANT_ID.to_string(),
            operator: acidlake_core::Operator::Eq,
            value: serde_json::json!(req.tenant_id),
        });
        let predicate = build_catalog_predicate(&filters)?;

        table.delete(&predicate).await?;

        let files_after = table.plan_files().await?.len() as u64;
        self.caches.lock().invalidate_metadata(ident.catalog_name());

        Ok(HardDeleteResponseData {
            records_deleted: matched.len() as u64,
            // §4.7 step 4: files_before - files_after.
            files_rewritten: files_before.saturating_sub(files_after),
        })
    }
}
