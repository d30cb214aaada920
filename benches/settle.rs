//! Throw settling benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use curling_engine::core::rng::SeededRng;
use curling_engine::core::vec2::Vec2;
use curling_engine::game::surface::{button, hack};
use curling_engine::game::tick::settle;
use curling_engine::game::zone::{generate_rough_zones, ZoneSet};
use curling_engine::{Stone, Team};

fn draw(c: &mut Criterion) {
    let zones = ZoneSet::default();
    c.bench_function("settle_draw_empty_sheet", |b| {
        b.iter(|| {
            let mut stones = vec![Stone::new(Team::Red, hack(), Vec2::new(0.0, -9.2))];
            black_box(settle(&mut stones, &zones, 1, 3600))
        })
    });
}

fn takeout(c: &mut Criterion) {
    let mut rng = SeededRng::new(42);
    let mut zones = ZoneSet::default();
    zones.set_rough(generate_rough_zones(&mut rng));

    let mut house = Vec::new();
    for i in 0..15 {
        let team = if i % 2 == 0 { Team::Red } else { Team::Yellow };
        let offset = Vec2::new(rng.next_f64_range(-70.0, 70.0), rng.next_f64_range(-70.0, 70.0));
        house.push(Stone::at_rest(team, button() + offset));
    }

    c.bench_function("settle_takeout_full_house", |b| {
        b.iter(|| {
            let mut stones = house.clone();
            stones.push(Stone::new(Team::Yellow, hack(), Vec2::new(0.0, -14.0)));
            black_box(settle(&mut stones, &zones, 8, 3600))
        })
    });
}

criterion_group!(benches, draw, takeout);
criterion_main!(benches);
