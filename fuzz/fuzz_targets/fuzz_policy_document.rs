#![no_main]
use libfuzzer_sys::fuzz_target;
use pbac_rs::{PolicyEngine, Request};

// Arbitrary JSON must be rejected or accepted, never panic
fuzz_target!(|data: &[u8]| {
    let Ok(document) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    for validate in [true, false] {
        let engine = match PolicyEngine::builder()
            .validate_policies(validate)
            .policies(document.clone())
            .build()
        {
            Ok(engine) => engine,
            Err(_) => continue,
        };

        let _ = engine.evaluate(&Request::new("fuzz:Action", "arn:fuzz:::resource"));
    }
});
