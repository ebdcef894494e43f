//! Lifecycle properties of the provisioning engine, run against the
//! in-memory control plane.

use garage_cosi_admin::{AdminCall, CallContext, Fault, MemoryAdmin};
use garage_cosi_core::credentials::{
    PROTOCOL_S3, SECRET_ACCESS_KEY_ID, SECRET_ACCESS_SECRET_KEY, SECRET_ENDPOINT, SECRET_REGION,
};
use garage_cosi_core::{
    AuthenticationType, ConnectionInfo, EngineContext, ErrorKind, GrantAccessRequest,
    ProtocolDescriptor, ProvisioningEngine, S3SignatureVersion,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

fn setup() -> (Arc<MemoryAdmin>, ProvisioningEngine) {
    let admin = Arc::new(MemoryAdmin::new());
    let context = EngineContext::new(
        admin.clone(),
        ConnectionInfo {
            endpoint: "https://s3.garage.example".to_owned(),
            region: "garage".to_owned(),
        },
    );
    (admin, ProvisioningEngine::new(context))
}

fn grant(name: &str, bucket_id: &str, params: &[(&str, &str)]) -> GrantAccessRequest {
    GrantAccessRequest {
        name: name.to_owned(),
        bucket_id: bucket_id.to_owned(),
        authentication_type: AuthenticationType::Key,
        parameters: Some(
            params
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect::<HashMap<_, _>>(),
        ),
    }
}

#[test]
fn create_bucket_twice_returns_same_id() {
    let (admin, engine) = setup();
    let ctx = CallContext::background();

    let first = engine.create_bucket(&ctx, "b1").unwrap();
    let second = engine.create_bucket(&ctx, "b1").unwrap();

    assert_eq!(first.bucket_id, second.bucket_id);
    assert_eq!(admin.bucket_count(), 1);
    assert_eq!(admin.count(AdminCall::CreateBucket), 1);
    assert_eq!(admin.count(AdminCall::ListBuckets), 2);
}

#[test]
fn create_bucket_reports_s3_v4_protocol() {
    let (_admin, engine) = setup();
    let resp = engine
        .create_bucket(&CallContext::background(), "media")
        .unwrap();
    let ProtocolDescriptor::S3(s3) = resp.bucket_info;
    assert_eq!(s3.region, "garage");
    assert_eq!(s3.signature_version, S3SignatureVersion::V4);
}

#[test]
fn delete_unknown_bucket_matches_delete_of_deleted_bucket() {
    let (_admin, engine) = setup();
    let ctx = CallContext::background();

    assert!(engine.delete_bucket(&ctx, "never-existed").is_ok());

    let id = engine.create_bucket(&ctx, "tmp").unwrap().bucket_id;
    assert!(engine.delete_bucket(&ctx, &id).is_ok());
    assert!(engine.delete_bucket(&ctx, &id).is_ok());
}

#[test]
fn iam_grant_is_unsupported_for_any_input() {
    let (admin, engine) = setup();
    let ctx = CallContext::background();
    let bucket_id = engine.create_bucket(&ctx, "logs").unwrap().bucket_id;
    let before = admin.calls().len();

    for (bucket, params) in [
        (bucket_id.as_str(), vec![]),
        ("missing", vec![("read", "maybe")]),
        ("", vec![("owner", "true")]),
    ] {
        let mut req = grant("svc", bucket, &params);
        req.authentication_type = AuthenticationType::Iam;
        let err = engine.grant_access(&ctx, &req).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
    assert_eq!(admin.calls().len(), before);
}

#[test]
fn credential_bundle_shape() {
    let (_admin, engine) = setup();
    let ctx = CallContext::background();
    let bucket_id = engine.create_bucket(&ctx, "logs").unwrap().bucket_id;

    let resp = engine
        .grant_access(&ctx, &grant("reader", &bucket_id, &[("write", "false")]))
        .unwrap();

    assert_eq!(resp.credentials.len(), 1);
    let s3 = &resp.credentials[PROTOCOL_S3];
    let mut keys: Vec<&str> = s3.secrets.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            SECRET_ACCESS_KEY_ID,
            SECRET_ACCESS_SECRET_KEY,
            SECRET_ENDPOINT,
            SECRET_REGION
        ]
    );
    assert_eq!(s3.secrets[SECRET_ACCESS_KEY_ID], resp.account_id);
    assert_eq!(s3.secrets[SECRET_ENDPOINT], "https://s3.garage.example");
    assert_eq!(s3.secrets[SECRET_REGION], "garage");
    assert!(!s3.secrets[SECRET_ACCESS_SECRET_KEY].is_empty());
}

#[test]
fn revoke_missing_key_is_internal_unlike_delete_bucket() {
    let (_admin, engine) = setup();
    let ctx = CallContext::background();

    assert!(engine.delete_bucket(&ctx, "ghost").is_ok());
    let err = engine.revoke_access(&ctx, "GKghost").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[test]
fn end_to_end_logs_scenario() {
    let (admin, engine) = setup();
    let ctx = CallContext::background();

    let b1 = engine.create_bucket(&ctx, "logs").unwrap().bucket_id;

    let granted = engine
        .grant_access(&ctx, &grant("writer-svc", &b1, &[("write", "true")]))
        .unwrap();
    let k1 = granted.account_id;
    let perms = admin.grant(&k1, &b1).unwrap();
    assert!(perms.write);
    assert!(perms.read);
    assert!(!perms.owner);

    engine.revoke_access(&ctx, &k1).unwrap();
    let err = engine.revoke_access(&ctx, &k1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[test]
fn parse_failure_orphans_created_key() {
    let (admin, engine) = setup();
    let ctx = CallContext::background();
    let bucket_id = engine.create_bucket(&ctx, "logs").unwrap().bucket_id;

    let err = engine
        .grant_access(&ctx, &grant("svc", &bucket_id, &[("read", "maybe")]))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert_eq!(admin.key_count(), 1);
    assert_eq!(admin.count(AdminCall::AllowBucketKey), 0);
    assert_eq!(admin.count(AdminCall::DeleteKey), 0);
}

#[test]
fn failures_are_not_retried() {
    let (admin, engine) = setup();
    let ctx = CallContext::background();

    admin.fail_next(AdminCall::CreateBucket, Fault::Status(503));
    let err = engine.create_bucket(&ctx, "flaky").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(admin.count(AdminCall::CreateBucket), 1);

    admin.fail_next(AdminCall::DeleteBucket, Fault::Transport("reset".to_owned()));
    assert!(engine.delete_bucket(&ctx, "b").is_err());
    assert_eq!(admin.count(AdminCall::DeleteBucket), 1);
}

#[test]
fn concurrent_calls_on_shared_engine() {
    let (admin, engine) = setup();
    let engine = Arc::new(engine);
    let ctx = CallContext::background();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let ctx = ctx.clone();
            thread::spawn(move || {
                let bucket = engine.create_bucket(&ctx, &format!("bucket-{i}")).unwrap();
                engine
                    .grant_access(&ctx, &grant(&format!("svc-{i}"), &bucket.bucket_id, &[]))
                    .unwrap()
                    .account_id
            })
        })
        .collect();

    let mut accounts: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    accounts.sort();
    accounts.dedup();
    assert_eq!(accounts.len(), 8);
    assert_eq!(admin.bucket_count(), 8);
    assert_eq!(admin.key_count(), 8);
}

#[test]
fn cancellation_before_grant_makes_no_calls() {
    let (admin, engine) = setup();
    let ctx = CallContext::background();
    ctx.cancel();

    let err = engine
        .grant_access(&ctx, &grant("svc", "b1", &[]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(admin.calls().is_empty());
}
