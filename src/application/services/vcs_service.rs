use std::sync::Arc;

use tracing::warn;
use url::Url;

use crate::application::ports::KvStore;
use crate::application::services::kv_mutator::KvMutator;
use crate::error::{BridgeError, Result};
use crate::infrastructure::logging::{BoundaryLogger, Timer};
use crate::models::{builtin_vcs, builtin_vcs_list, VcsIdentity};

pub const VCS_KEY_PREFIX: &str = "vcs_";
pub const VCS_LIST_KEY: &str = "vcs_list";

fn vcs_key(alias: &str) -> String {
    format!("{}{}", VCS_KEY_PREFIX, alias)
}

/// `list` would land on `vcs_list` itself
fn is_reserved(alias: &str) -> bool {
    vcs_key(alias) == VCS_LIST_KEY
}

/// VcsService - resolves VCS aliases and manages custom ones
///
/// Built-in aliases are checked first and can neither be shadowed nor
/// deleted. Custom identities live under `vcs_<alias>`, with `vcs_list`
/// kept alongside for listing.
pub struct VcsService<S>
where
    S: KvStore + ?Sized,
{
    kv: Arc<KvMutator<S>>,
    logger: Arc<BoundaryLogger>,
}

impl<S> VcsService<S>
where
    S: KvStore + ?Sized,
{
    pub fn new(kv: Arc<KvMutator<S>>, logger: Arc<BoundaryLogger>) -> Self {
        Self { kv, logger }
    }

    pub async fn resolve(&self, trace_id: &str, alias: &str) -> Result<VcsIdentity> {
        if let Some(vcs) = builtin_vcs(alias) {
            return Ok(vcs);
        }

        if is_reserved(alias) {
            return Err(BridgeError::NotFound(format!("VCS `{}`", alias)));
        }

        let key = vcs_key(alias);
        let bytes = self.kv.get(trace_id, "VcsService", &key).await?;
        match bytes {
            Some(bytes) if !bytes.is_empty() => {
                serde_json::from_slice(&bytes).map_err(|e| BridgeError::corrupt(&key, e))
            }
            _ => Err(BridgeError::NotFound(format!("VCS `{}`", alias))),
        }
    }

    pub async fn add(&self, trace_id: &str, vcs: VcsIdentity) -> Result<()> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "VcsService", "add", &vcs);

        if let Err(e) = self.add_inner(trace_id, &vcs).await {
            self.logger.service_error(trace_id, "Command", "VcsService", "add", &e);
            return Err(e);
        }

        self.logger.service_exit(trace_id, "Command", "VcsService", "add", timer.elapsed_ms());
        Ok(())
    }

    async fn add_inner(&self, trace_id: &str, vcs: &VcsIdentity) -> Result<()> {
        validate(vcs)?;

        if builtin_vcs(&vcs.alias).is_some() || is_reserved(&vcs.alias) {
            return Err(BridgeError::AliasConflict(vcs.alias.clone()));
        }

        let key = vcs_key(&vcs.alias);
        let bytes = serde_json::to_vec(vcs).map_err(|e| BridgeError::corrupt(&key, e))?;
        if !self.kv.insert_if_absent(trace_id, "VcsService", &key, &bytes).await? {
            return Err(BridgeError::AliasConflict(vcs.alias.clone()));
        }

        let listed = self
            .kv
            .atomic_modify(trace_id, "VcsService", VCS_LIST_KEY, |current| {
                let mut list = decode_list(current)?;
                list.retain(|existing| existing.alias != vcs.alias);
                list.push(vcs.clone());
                serde_json::to_vec(&list).map_err(|e| BridgeError::corrupt(VCS_LIST_KEY, e))
            })
            .await;

        // an alias that resolves but is never listed cannot be re-added, undo the insert
        if let Err(e) = listed {
            warn!("[{}] Rolling back VCS `{}`: {} update failed: {}", trace_id, vcs.alias, VCS_LIST_KEY, e);
            if let Err(rollback) = self.kv.delete(trace_id, "VcsService", &key).await {
                warn!("[{}] Rollback of {} failed: {}", trace_id, key, rollback);
            }
            return Err(e);
        }

        Ok(())
    }

    pub async fn delete(&self, trace_id: &str, alias: &str) -> Result<()> {
        let timer = Timer::start();
        self.logger.service_entry(trace_id, "Command", "VcsService", "delete", &alias);

        if let Err(e) = self.delete_inner(trace_id, alias).await {
            self.logger.service_error(trace_id, "Command", "VcsService", "delete", &e);
            return Err(e);
        }

        self.logger.service_exit(trace_id, "Command", "VcsService", "delete", timer.elapsed_ms());
        Ok(())
    }

    async fn delete_inner(&self, trace_id: &str, alias: &str) -> Result<()> {
        if builtin_vcs(alias).is_some() {
            return Err(BridgeError::ProtectedAlias(alias.to_string()));
        }

        // fails with NotFound for unknown aliases
        self.resolve(trace_id, alias).await?;

        // unlisted before the entry goes, so a failed delete can simply be retried
        self.kv
            .atomic_modify(trace_id, "VcsService", VCS_LIST_KEY, |current| {
                let mut list = decode_list(current)?;
                list.retain(|existing| existing.alias != alias);
                serde_json::to_vec(&list).map_err(|e| BridgeError::corrupt(VCS_LIST_KEY, e))
            })
            .await?;
        self.kv.delete(trace_id, "VcsService", &vcs_key(alias)).await
    }

    /// Built-ins first, then custom identities in the order they were added
    pub async fn list(&self, trace_id: &str) -> Result<Vec<VcsIdentity>> {
        let bytes = self.kv.get(trace_id, "VcsService", VCS_LIST_KEY).await?;
        let mut list = builtin_vcs_list();
        list.extend(decode_list(bytes.as_deref())?);
        Ok(list)
    }
}

fn validate(vcs: &VcsIdentity) -> Result<()> {
    if vcs.alias.trim().is_empty() || vcs.alias.chars().any(char::is_whitespace) {
        return Err(BridgeError::Validation("VCS alias cannot be empty or contain spaces".to_string()));
    }

    Url::parse(&vcs.base_url)
        .map_err(|e| BridgeError::Validation(format!("base url is invalid: {}", e)))?;

    Ok(())
}

fn decode_list(bytes: Option<&[u8]>) -> Result<Vec<VcsIdentity>> {
    match bytes {
        Some(b) if !b.is_empty() => {
            let list: Option<Vec<VcsIdentity>> =
                serde_json::from_slice(b).map_err(|e| BridgeError::corrupt(VCS_LIST_KEY, e))?;
            Ok(list.unwrap_or_default())
        }
        _ => Ok(Vec::new()),
    }
}
