use ark_bn254::Fr;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use verifiable_functions::{
    circuit::ConstraintSystem,
    sha, ssz,
    vars::{Byte, Bytes32},
};

fn alloc_message(cs: &mut ConstraintSystem<Fr>, data: &[u8]) -> Vec<Byte<Fr>> {
    data.iter()
        .map(|b| Byte::alloc(cs, Some(*b)).unwrap())
        .collect()
}

fn bench_sha256(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bench SHA-256: Prove Mode");
    for blocks in 1..=4 {
        let len = blocks * 64 - 9;
        let data = vec![0xa5u8; len];
        group.bench_with_input(BenchmarkId::new("Number of blocks", blocks), &data, |b, data| {
            b.iter(|| {
                let mut cs = ConstraintSystem::<Fr>::prove();
                let message = alloc_message(&mut cs, data);
                sha::sha256(&mut cs, black_box(&message)).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_sha256_setup(c: &mut Criterion) {
    c.bench_function("Bench SHA-256: Setup Mode", |b| {
        b.iter(|| {
            let mut cs = ConstraintSystem::<Fr>::setup();
            let message = alloc_message(&mut cs, &[0u8; 55]);
            sha::sha256(&mut cs, black_box(&message)).unwrap();
            cs.matrices().unwrap()
        })
    });
}

fn bench_merkle_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bench SSZ: Restore Merkle Root");
    for depth in [2usize, 4, 6] {
        let leaf = [7u8; 32];
        let branch: Vec<[u8; 32]> = (0..depth).map(|i| [i as u8; 32]).collect();
        let gindex = (1u64 << depth) + 1;
        group.bench_with_input(BenchmarkId::new("Depth", depth), &depth, |b, _| {
            b.iter(|| {
                let mut cs = ConstraintSystem::<Fr>::prove();
                let leaf = Bytes32::alloc(&mut cs, Some(leaf)).unwrap();
                let branch = branch
                    .iter()
                    .map(|node| Bytes32::alloc(&mut cs, Some(*node)).unwrap())
                    .collect::<Vec<_>>();
                ssz::restore_merkle_root(&mut cs, black_box(&leaf), &branch, gindex).unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sha256, bench_sha256_setup, bench_merkle_root);
criterion_main!(benches);
