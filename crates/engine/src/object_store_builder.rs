//! Builds the shared `ObjectStore` handle from §6.5's `s3.*` configuration,
//! including express-tier endpoint derivation (§9).

use crate::config::{derive_express_endpoint, S3Config};
use acidlake_core::{EngineError, EngineResult};
use object_store::aws::AmazonS3Builder;
use object_store::ObjectStore;
use std::sync::Arc;

/// Construct the object store the catalog and query adapters share,
/// configured once at startup (§5 Shared resources).
pub fn build_object_store(s3: &S3Config) -> EngineResult<Arc<dyn ObjectStore>> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(&s3.bucket_name)
        .with_region(&s3.region)
        .with_allow_http(!s3.use_ssl)
        .with_virtual_hosted_style_request(!s3.path_style_access);

    if let Some(endpoint) = s3.endpoint.clone().or_else(|| derive_express_endpoint(s3)) {
        let endpoint = if endpoint.starts_with("http") {
            endpoint
        } else {
            let scheme = if s3.use_ssl { "https" } else { "http" };
            format!("{scheme}://{endpoint}")
        };
        builder = builder.with_endpoint(endpoint);
    }

    if let (Some(key), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
        builder = builder.with_access_key_id(key).with_secret_access_key(secret);
    }

    let store = builder
        .build()
        .map_err(|e| EngineError::init_failure(format!("failed to configure object store: {e}")))?;
    Ok(Arc::new(store))
}
