//! Shared fixtures for wayfinder-core integration tests

#![allow(dead_code)]

use std::sync::Arc;

use proptest::prelude::*;
use wayfinder_core::{AccessPointCatalogue, CoarseLocation, SensorSnapshot};

/// Catalogue of `count` sequential addresses with a building-specific prefix
pub fn sequential_catalogue(building: &str, prefix: u8, count: usize) -> Arc<AccessPointCatalogue> {
    let addresses: Vec<String> = (0..count)
        .map(|i| format!("{:02x}:00:00:00:{:02x}:{:02x}", prefix, (i >> 8) & 0xff, i & 0xff))
        .collect();
    Arc::new(AccessPointCatalogue::new(building, &addresses).unwrap())
}

pub fn arb_triple() -> impl Strategy<Value = [f32; 3]> {
    [-100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0]
}

pub fn arb_snapshot() -> impl Strategy<Value = SensorSnapshot> {
    (arb_triple(), arb_triple(), 0.0f32..10_000.0, arb_triple(), arb_triple()).prop_map(
        |(accelerometer, magnetic, light, rotation, orientation)| SensorSnapshot {
            accelerometer,
            magnetic,
            light,
            rotation,
            orientation,
        },
    )
}

pub fn arb_location() -> impl Strategy<Value = Option<CoarseLocation>> {
    prop::option::of((-90.0f64..90.0, -180.0f64..180.0, 0.0f32..5_000.0).prop_map(|(lat, lon, acc)| {
        CoarseLocation::new(lat, lon, acc)
    }))
}
