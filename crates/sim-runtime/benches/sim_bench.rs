use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

const STATEMENT: &str = "We can raise the affordable share a little if the council keeps the \
                         venue at a scale the neighbourhood can actually use every week";

fn bench_negotiation(c: &mut Criterion) {
    let scenario = Arc::new(sim_core::Scenario::builtin().unwrap());
    let engine = sim_runtime::RoundEngine::new(
        scenario,
        Arc::new(sim_ai::ScriptedOracle::new(2)),
    );
    let role = sim_core::RoleId::from("urban_designer");
    let fresh = engine.new_session(&role, 42).unwrap();

    c.bench_function("single_round", |b| {
        b.iter(|| {
            let mut state = fresh.clone();
            let _ = engine.submit_statement(&mut state, STATEMENT);
        })
    });
    c.bench_function("full_negotiation", |b| {
        b.iter(|| {
            let mut state = fresh.clone();
            while !state.is_terminated() {
                if engine.submit_statement(&mut state, STATEMENT).is_err() {
                    break;
                }
            }
        })
    });
}

criterion_group!(benches, bench_negotiation);
criterion_main!(benches);
