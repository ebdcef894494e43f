use crate::{
    AddKeyRequest, AdminApi, AdminError, AllowBucketKeyRequest, ApiResponse, BucketInfo,
    BucketKeyPermissions, BucketSummary, CallContext, CreateBucketRequest, KeyInfo, SecretKey,
    STATUS_NOT_FOUND, STATUS_NO_CONTENT, STATUS_OK,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

/// One of the six control-plane operations, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminCall {
    ListBuckets,
    CreateBucket,
    DeleteBucket,
    AddKey,
    AllowBucketKey,
    DeleteKey,
}

/// Failure injected into the next invocation of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this status and no body.
    Status(u16),
    /// Fail the round trip itself.
    Transport(String),
}

#[derive(Debug, Clone)]
struct StoredKey {
    name: String,
    grants: BTreeMap<String, BucketKeyPermissions>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, Vec<String>>,
    keys: BTreeMap<String, StoredKey>,
    calls: Vec<AdminCall>,
    faults: HashMap<AdminCall, Fault>,
    next_id: u64,
}

impl State {
    fn fresh_id(&mut self, salt: &str) -> String {
        self.next_id += 1;
        blake3::hash(format!("{salt}:{}", self.next_id).as_bytes())
            .to_hex()
            .to_string()
    }
}

/// In-memory control plane that answers with the same statuses Garage does.
///
/// Every invocation is appended to a call log, and a [`Fault`] can be
/// armed per operation to exercise failure paths.
#[derive(Default)]
pub struct MemoryAdmin {
    state: Mutex<State>,
}

impl MemoryAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AdminError> {
        self.state
            .lock()
            .map_err(|e| AdminError::Transport(format!("mutex poisoned: {e}")))
    }

    /// Record the call, then apply the context and any armed fault.
    /// Returns `Some(status)` when a status fault short-circuits the call.
    fn enter(
        &self,
        ctx: &CallContext,
        call: AdminCall,
    ) -> Result<(MutexGuard<'_, State>, Option<u16>), AdminError> {
        ctx.check()?;
        let mut state = self.lock()?;
        state.calls.push(call);
        match state.faults.remove(&call) {
            Some(Fault::Transport(msg)) => Err(AdminError::Transport(msg)),
            Some(Fault::Status(code)) => Ok((state, Some(code))),
            None => Ok((state, None)),
        }
    }

    /// Arm a fault for the next invocation of `call`.
    pub fn fail_next(&self, call: AdminCall, fault: Fault) {
        if let Ok(mut state) = self.state.lock() {
            state.faults.insert(call, fault);
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<AdminCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, call: AdminCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn bucket_count(&self) -> usize {
        self.state.lock().map(|s| s.buckets.len()).unwrap_or(0)
    }

    pub fn key_count(&self) -> usize {
        self.state.lock().map(|s| s.keys.len()).unwrap_or(0)
    }

    /// Name the key was created with, if it still exists.
    pub fn key_name(&self, access_key_id: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.keys.get(access_key_id).map(|k| k.name.clone())
    }

    /// Permissions bound for `access_key_id` on `bucket_id`, if any.
    pub fn grant(&self, access_key_id: &str, bucket_id: &str) -> Option<BucketKeyPermissions> {
        let state = self.state.lock().ok()?;
        state.keys.get(access_key_id)?.grants.get(bucket_id).copied()
    }
}

impl AdminApi for MemoryAdmin {
    fn list_buckets(
        &self,
        ctx: &CallContext,
    ) -> Result<ApiResponse<Vec<BucketSummary>>, AdminError> {
        let (state, fault) = self.enter(ctx, AdminCall::ListBuckets)?;
        if let Some(code) = fault {
            return Ok(ApiResponse::empty(code));
        }
        let list = state
            .buckets
            .iter()
            .map(|(id, aliases)| BucketSummary {
                id: id.clone(),
                global_aliases: aliases.clone(),
            })
            .collect();
        Ok(ApiResponse::ok(list))
    }

    fn create_bucket(
        &self,
        ctx: &CallContext,
        req: &CreateBucketRequest,
    ) -> Result<ApiResponse<BucketInfo>, AdminError> {
        let (mut state, fault) = self.enter(ctx, AdminCall::CreateBucket)?;
        if let Some(code) = fault {
            return Ok(ApiResponse::empty(code));
        }
        // Garage refuses a global alias that is already taken.
        if state
            .buckets
            .values()
            .any(|aliases| aliases.contains(&req.global_alias))
        {
            return Ok(ApiResponse::empty(409));
        }
        let id = state.fresh_id("bucket");
        let aliases = vec![req.global_alias.clone()];
        state.buckets.insert(id.clone(), aliases.clone());
        Ok(ApiResponse::ok(BucketInfo {
            id,
            global_aliases: aliases,
        }))
    }

    fn delete_bucket(&self, ctx: &CallContext, id: &str) -> Result<ApiResponse<()>, AdminError> {
        let (mut state, fault) = self.enter(ctx, AdminCall::DeleteBucket)?;
        if let Some(code) = fault {
            return Ok(ApiResponse::empty(code));
        }
        if state.buckets.remove(id).is_none() {
            return Ok(ApiResponse::empty(STATUS_NOT_FOUND));
        }
        for key in state.keys.values_mut() {
            key.grants.remove(id);
        }
        Ok(ApiResponse::empty(STATUS_NO_CONTENT))
    }

    fn add_key(
        &self,
        ctx: &CallContext,
        req: &AddKeyRequest,
    ) -> Result<ApiResponse<KeyInfo>, AdminError> {
        let (mut state, fault) = self.enter(ctx, AdminCall::AddKey)?;
        if let Some(code) = fault {
            return Ok(ApiResponse::empty(code));
        }
        let digest = state.fresh_id(&req.name);
        let access_key_id = format!("GK{}", &digest[..24]);
        let secret = state.fresh_id(&access_key_id);
        state.keys.insert(
            access_key_id.clone(),
            StoredKey {
                name: req.name.clone(),
                grants: BTreeMap::new(),
            },
        );
        Ok(ApiResponse::ok(KeyInfo {
            name: req.name.clone(),
            access_key_id,
            secret_access_key: Some(SecretKey::new(secret)),
        }))
    }

    fn allow_bucket_key(
        &self,
        ctx: &CallContext,
        req: &AllowBucketKeyRequest,
    ) -> Result<ApiResponse<()>, AdminError> {
        let (mut state, fault) = self.enter(ctx, AdminCall::AllowBucketKey)?;
        if let Some(code) = fault {
            return Ok(ApiResponse::empty(code));
        }
        if !state.buckets.contains_key(&req.bucket_id) {
            return Ok(ApiResponse::empty(STATUS_NOT_FOUND));
        }
        let Some(key) = state.keys.get_mut(&req.access_key_id) else {
            return Ok(ApiResponse::empty(STATUS_NOT_FOUND));
        };
        key.grants.insert(req.bucket_id.clone(), req.permissions);
        Ok(ApiResponse {
            status: STATUS_OK,
            body: Some(()),
        })
    }

    fn delete_key(&self, ctx: &CallContext, id: &str) -> Result<ApiResponse<()>, AdminError> {
        let (mut state, fault) = self.enter(ctx, AdminCall::DeleteKey)?;
        if let Some(code) = fault {
            return Ok(ApiResponse::empty(code));
        }
        if state.keys.remove(id).is_none() {
            return Ok(ApiResponse::empty(STATUS_NOT_FOUND));
        }
        Ok(ApiResponse::empty(STATUS_NO_CONTENT))
    }
}
