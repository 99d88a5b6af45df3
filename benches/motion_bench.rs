// ABOUTME: Criterion benchmarks for the per-frame and per-repetition motion algorithms
// ABOUTME: Measures DTW comparison, weighted multi-joint DTW and Procrustes alignment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Rehab Sync Engine Contributors

//! Criterion benchmarks for motion analysis.
//!
//! DTW runs once per repetition over the rep window; Procrustes alignment can
//! run per frame, so both are tracked across realistic input sizes.

#![allow(clippy::missing_docs_in_private_items, missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rehab_sync_engine::intelligence::{DtwAnalyzer, SkeletonNormalizer};
use rehab_sync_engine::models::{ExerciseType, JointType};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Sequence lengths in frames (1s, 3s and 10s at 30 fps)
const SEQUENCE_LENGTHS: [usize; 3] = [30, 90, 300];

/// Arm raise shaped curve with a phase offset to keep DTW busy
#[allow(clippy::cast_precision_loss)]
fn raise_curve(len: usize, amplitude: f64, phase: f64) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let t = i as f64 / len as f64;
            amplitude * (PI * t + phase).sin().abs()
        })
        .collect()
}

/// 33 landmarks on a loose stick figure, rotated and scaled
#[allow(clippy::cast_precision_loss)]
fn skeleton(rotation: f64, scale: f64) -> Vec<[f64; 3]> {
    let (sin, cos) = rotation.sin_cos();
    (0..33)
        .map(|i| {
            let x = (i % 5) as f64 * 0.1;
            let y = (i / 5) as f64 * 0.15;
            [
                scale * (x * cos - y * sin) + 0.3,
                scale * (x * sin + y * cos) - 0.1,
                0.0,
            ]
        })
        .collect()
}

fn bench_dtw_single_joint(c: &mut Criterion) {
    let mut group = c.benchmark_group("dtw");
    let analyzer = DtwAnalyzer::default();

    for len in SEQUENCE_LENGTHS {
        let user = raise_curve(len, 95.0, 0.2);
        let reference = raise_curve(len, 150.0, 0.0);
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(
            BenchmarkId::new("analyze_joint", len),
            &(user, reference),
            |b, (user, reference)| {
                b.iter(|| analyzer.analyze_joint(black_box(user), black_box(reference)));
            },
        );
    }

    group.finish();
}

fn bench_dtw_weighted(c: &mut Criterion) {
    let mut group = c.benchmark_group("dtw_weighted");
    let analyzer = DtwAnalyzer::default();
    let weights = ExerciseType::ArmRaise.joint_weights(analyzer.config().default_joint_weight);
    let joints = [
        JointType::LeftShoulder,
        JointType::LeftElbow,
        JointType::LeftHip,
        JointType::LeftKnee,
    ];

    for len in SEQUENCE_LENGTHS {
        let user: HashMap<JointType, Vec<f64>> = joints
            .iter()
            .map(|&joint| (joint, raise_curve(len, 90.0, 0.3)))
            .collect();
        let reference: HashMap<JointType, Vec<f64>> = joints
            .iter()
            .map(|&joint| (joint, raise_curve(len, 140.0, 0.0)))
            .collect();
        group.bench_with_input(
            BenchmarkId::new("analyze_weighted", len),
            &(user, reference),
            |b, (user, reference)| {
                b.iter(|| {
                    analyzer.analyze_weighted(black_box(user), black_box(reference), &weights)
                });
            },
        );
    }

    group.finish();
}

fn bench_procrustes(c: &mut Criterion) {
    let mut group = c.benchmark_group("procrustes");
    let normalizer = SkeletonNormalizer::default();
    let reference = skeleton(0.0, 1.0);
    let target = skeleton(0.4, 2.5);

    group.bench_function("align_33_landmarks", |b| {
        b.iter(|| normalizer.align(black_box(&target), black_box(&reference)));
    });

    let core_reference = &reference[..12];
    let core_target = &target[..12];
    group.bench_function("align_core_landmarks", |b| {
        b.iter(|| normalizer.align(black_box(core_target), black_box(core_reference)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_dtw_single_joint,
    bench_dtw_weighted,
    bench_procrustes
);
criterion_main!(benches);
