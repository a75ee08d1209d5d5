//! Loading policy and request documents from disk

use pbac_rs::{Policy, PolicyEngine, Request};
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [{
        "Sid": "OwnObjects",
        "Effect": "Allow",
        "Action": ["s3:GetObject", "s3:PutObject"],
        "Resource": "arn:aws:s3:::home/${aws:username}/*"
    }]
}"#;

const REQUEST: &str = r#"{
    "action": "s3:PutObject",
    "resource": "arn:aws:s3:::home/alice/todo.txt",
    "principal": { "AWS": "arn:aws:iam::123456789012:user/alice" },
    "variables": { "aws": { "username": "alice" } }
}"#;

#[test]
fn test_engine_from_files() {
    let dir = TempDir::new().unwrap();
    let policy_path = dir.path().join("policy.json");
    let request_path = dir.path().join("request.json");
    fs::write(&policy_path, POLICY).unwrap();
    fs::write(&request_path, REQUEST).unwrap();

    let document: Value = serde_json::from_str(&fs::read_to_string(&policy_path).unwrap()).unwrap();
    let engine = PolicyEngine::new(document).unwrap();

    let request: Request =
        serde_json::from_str(&fs::read_to_string(&request_path).unwrap()).unwrap();
    assert!(engine.evaluate(&request).unwrap());

    let mut other = request.clone();
    other.resource = "arn:aws:s3:::home/bob/todo.txt".to_string();
    assert!(!engine.evaluate(&other).unwrap());
}

#[test]
fn test_typed_policy_file_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("policy.json");

    let policy = Policy::from_json(POLICY).unwrap();
    fs::write(&path, policy.to_json().unwrap()).unwrap();

    let reloaded = Policy::from_json(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(reloaded, policy);
    assert_eq!(reloaded.statement[0].sid.as_deref(), Some("OwnObjects"));

    let engine = PolicyEngine::builder().policy(reloaded).build().unwrap();
    assert_eq!(engine.statement_count(), 1);
}
