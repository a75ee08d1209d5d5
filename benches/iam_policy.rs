use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pbac_rs::iam::{ConditionValue, Effect, Policy, PolicyEngine, Request, Statement};

/// Create a policy mixing wildcards, variables and conditions
fn create_complex_policy() -> Policy {
    Policy::new()
        .with_statement(
            Statement::new(Effect::Allow)
                .with_action(["s3:GetObject", "s3:ListBucket"])
                .with_resource("arn:aws:s3:::public/*"),
        )
        .with_statement(
            Statement::new(Effect::Allow)
                .with_action(["s3:GetObject", "s3:PutObject"])
                .with_resource("arn:aws:s3:::users/${aws:username}/*")
                .with_condition("Bool", "aws:MultiFactorAuthPresent", true),
        )
        .with_statement(
            Statement::new(Effect::Deny)
                .with_action("s3:PutObject")
                .with_resource("arn:aws:s3:::system/*"),
        )
}

fn user_request(i: usize) -> Request {
    Request::new("s3:GetObject", format!("arn:aws:s3:::users/user{}/doc.txt", i))
        .with_context("aws", "username", format!("user{}", i))
        .with_context("aws", "MultiFactorAuthPresent", true)
}

/// Benchmark evaluation with a warm pattern cache (hot path)
fn bench_policy_eval_cached(c: &mut Criterion) {
    let eval_counts = vec![100, 1_000, 10_000];

    let mut group = c.benchmark_group("policy_eval_cached");

    for count in eval_counts {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let engine = PolicyEngine::builder()
                .policy(create_complex_policy())
                .build()
                .unwrap();
            let request = Request::new("s3:GetObject", "arn:aws:s3:::public/readme.md");

            b.iter(|| {
                for _ in 0..count {
                    black_box(engine.evaluate(&request).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark evaluation with pattern caching disabled (every match compiles)
fn bench_policy_eval_uncached(c: &mut Criterion) {
    let eval_counts = vec![100, 1_000];

    let mut group = c.benchmark_group("policy_eval_uncached");

    for count in eval_counts {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let engine = PolicyEngine::builder()
                .pattern_cache_capacity(0)
                .policy(create_complex_policy())
                .build()
                .unwrap();

            b.iter(|| {
                for i in 0..count {
                    black_box(engine.evaluate(&user_request(i)).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark interpolated resources: each user produces a distinct pattern
fn bench_variable_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("variable_interpolation");

    group.bench_function("ten_users", |b| {
        let engine = PolicyEngine::builder()
            .policy(create_complex_policy())
            .build()
            .unwrap();
        let requests: Vec<_> = (0..10).map(user_request).collect();

        b.iter(|| {
            for request in &requests {
                black_box(engine.evaluate(request).unwrap());
            }
        });
    });

    group.bench_function("cache_eviction", |b| {
        let engine = PolicyEngine::builder()
            .pattern_cache_capacity(16)
            .policy(create_complex_policy())
            .build()
            .unwrap();

        b.iter(|| {
            // More distinct patterns than the cache holds
            for i in 0..100 {
                black_box(engine.evaluate(&user_request(i)).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark condition operators
fn bench_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("conditions");

    let cases = [
        (
            "ip_address",
            "IpAddress",
            "req:ip",
            ConditionValue::from("10.0.0.0/8"),
            ConditionValue::from("10.1.2.3"),
        ),
        (
            "date_less_than",
            "DateLessThan",
            "aws:CurrentTime",
            ConditionValue::from("2030-01-01T00:00:00Z"),
            ConditionValue::from("2024-06-01T12:00:00Z"),
        ),
        (
            "for_all_values",
            "ForAllValues:StringLike",
            "req:tags",
            ConditionValue::list(["team-*", "env-*", "cost-*"]),
            ConditionValue::list(["team-core", "env-prod", "cost-42"]),
        ),
    ];

    for (label, operator, key, declared, actual) in cases {
        let policy = Policy::new().with_statement(
            Statement::new(Effect::Allow).with_condition(operator, key, declared),
        );
        let engine = PolicyEngine::builder().policy(policy).build().unwrap();

        let (namespace, attribute) = key.split_once(':').unwrap();
        let request = Request::default().with_context(namespace, attribute, actual);

        group.bench_function(label, |b| {
            b.iter(|| black_box(engine.evaluate(&request).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark policy with many statements
fn bench_policy_complexity(c: &mut Criterion) {
    let statement_counts = vec![5, 25, 100];

    let mut group = c.benchmark_group("policy_complexity");

    for count in statement_counts {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut policy = Policy::new();
            for i in 0..count {
                policy.add_statement(
                    Statement::new(Effect::Allow)
                        .with_action("s3:GetObject")
                        .with_resource(format!("arn:aws:s3:::path_{}/*", i)),
                );
            }

            let engine = PolicyEngine::builder().policy(policy).build().unwrap();
            let requests: Vec<_> = (0..100)
                .map(|i| {
                    let resource = format!("arn:aws:s3:::path_{}/file.txt", i % count);
                    Request::new("s3:GetObject", resource)
                })
                .collect();

            b.iter(|| {
                for request in &requests {
                    black_box(engine.evaluate(request).unwrap());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark deny vs allow evaluation
fn bench_deny_vs_allow(c: &mut Criterion) {
    let mut group = c.benchmark_group("deny_vs_allow");

    let engine = PolicyEngine::builder()
        .policy(
            Policy::new()
                .with_statement(Statement::new(Effect::Allow).with_action("*").with_resource("*"))
                .with_statement(
                    Statement::new(Effect::Deny)
                        .with_action("*")
                        .with_resource("arn:aws:s3:::denied/*"),
                ),
        )
        .build()
        .unwrap();

    group.bench_function("allow_match", |b| {
        let request = Request::new("s3:GetObject", "arn:aws:s3:::allowed/file.txt");
        b.iter(|| black_box(engine.evaluate(&request).unwrap()));
    });

    group.bench_function("deny_match", |b| {
        let request = Request::new("s3:GetObject", "arn:aws:s3:::denied/file.txt");
        b.iter(|| black_box(engine.evaluate(&request).unwrap()));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_policy_eval_cached,
    bench_policy_eval_uncached,
    bench_variable_interpolation,
    bench_conditions,
    bench_policy_complexity,
    bench_deny_vs_allow,
);
criterion_main!(benches);
