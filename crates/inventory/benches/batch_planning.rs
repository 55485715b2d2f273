//! Batch planning benchmarks.
//!
//! Measures the sequential projection over full-size batches, both spread over
//! many parts and concentrated on a single hot part.

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use depot_core::{TenantId, UserId};
use depot_inventory::{
    plan_batch, MovementKind, MovementRequest, Part, PartId, ReferenceSnapshot, MAX_BATCH_SIZE,
};

fn requests(parts: &[Part], len: usize) -> Vec<MovementRequest> {
    (0..len)
        .map(|i| MovementRequest {
            kind: if i % 2 == 0 {
                MovementKind::Arrival
            } else {
                MovementKind::Expense
            },
            part_id: parts[i % parts.len()].id,
            quantity: 1,
            description: format!("bench movement {i}"),
            equipment_id: None,
            repair_id: None,
        })
        .collect()
}

fn bench_plan_batch(c: &mut Criterion) {
    let tenant_id = TenantId::new();
    let actor = UserId::new();
    let mut group = c.benchmark_group("plan_batch");

    for distinct_parts in [1usize, 10, MAX_BATCH_SIZE] {
        let parts: Vec<Part> = (0..distinct_parts)
            .map(|i| Part::register(tenant_id, PartId::new(), format!("part {i}"), None, 1_000).unwrap())
            .collect();
        let refs = ReferenceSnapshot::new(parts.clone(), [], []);
        let items = requests(&parts, MAX_BATCH_SIZE);

        group.bench_with_input(
            BenchmarkId::from_parameter(distinct_parts),
            &items,
            |b, items| {
                b.iter(|| plan_batch(tenant_id, black_box(&refs), black_box(items), actor, Utc::now()))
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_plan_batch);
criterion_main!(benches);
