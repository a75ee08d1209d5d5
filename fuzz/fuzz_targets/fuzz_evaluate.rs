#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pbac_rs::iam::{ConditionValue, Effect, Policy, Statement};
use pbac_rs::{PolicyEngine, Request};

#[derive(Arbitrary, Debug)]
struct Input {
    action_pattern: String,
    resource_pattern: String,
    operator: u8,
    declared: String,
    action: String,
    resource: String,
    context_value: String,
    bytes: Vec<u8>,
}

const OPERATORS: &[&str] = &[
    "StringLike",
    "StringNotLike",
    "ArnLike",
    "DateLessThan",
    "NumericEquals",
    "IpAddress",
    "NotIpAddress",
    "BinaryEquals",
    "ForAllValues:StringLike",
    "ForAnyValue:StringEquals",
    "NullIfExists",
];

// Wildcards, variables and operands from the fuzzer must never panic
fuzz_target!(|input: Input| {
    let operator = OPERATORS[input.operator as usize % OPERATORS.len()];

    let policy = Policy::new().with_statement(
        Statement::new(Effect::Allow)
            .with_action(input.action_pattern.as_str())
            .with_resource(input.resource_pattern.as_str())
            .with_condition(operator, "fuzz:value", input.declared.as_str()),
    );

    let Ok(engine) = PolicyEngine::builder().policy(policy).build() else {
        return;
    };

    let value = if operator.starts_with("Binary") {
        ConditionValue::binary(input.bytes)
    } else {
        ConditionValue::from(input.context_value)
    };
    let request = Request::new(input.action, input.resource).with_context("fuzz", "value", value);

    let _ = engine.evaluate(&request);
});
