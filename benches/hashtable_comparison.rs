use alloc::format;
use core::hash::Hash;
use core::hash::Hasher;
use core::hint::black_box;

use criterion::AxisScale;
use criterion::BatchSize;
use criterion::Criterion;
use criterion::PlotConfiguration;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use ext_hash::HashTable as ExtHashTable;
use ext_hash::hash_table::Entry as ExtEntry;
use hashbrown::hash_table::Entry as HashbrownEntry;
use hashbrown::hash_table::HashTable as HashbrownHashTable;
use rand::Rng;
use rand::SeedableRng;
use rand::TryRngCore;
use rand::rngs::OsRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand_distr::Zipf;
use siphasher::sip::SipHasher;

extern crate alloc;

trait KeyValuePair: Clone {
    fn new(key: u64) -> Self;

    fn hash_key(&self) -> u64;
    fn eq_key(&self, other: &Self) -> bool;
}

#[derive(Clone)]
struct TestItem {
    key: String,
    _value: u64,
}

impl KeyValuePair for TestItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key: format!("key_{:016X}", key),
            _value: key,
        })
    }

    fn hash_key(&self) -> u64 {
        let mut hasher = SipHasher::new();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

#[derive(Clone)]
struct SmallTestItem {
    key: u64,
}

impl KeyValuePair for SmallTestItem {
    fn new(key: u64) -> Self {
        black_box(Self { key })
    }

    fn hash_key(&self) -> u64 {
        let mut hasher = SipHasher::new();
        self.key.hash(&mut hasher);
        hasher.finish()
    }

    fn eq_key(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 12),
    (1 << 14),
    (1 << 16),
    (1 << 18),
];

fn random_items<TestItem: KeyValuePair>(count: usize) -> Vec<(u64, TestItem)> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| {
            let key = rng.try_next_u64().unwrap();
            let item = TestItem::new(key);
            let hash = item.hash_key();
            (hash, item)
        })
        .collect()
}

fn ext_table_of<TestItem: KeyValuePair>(items: &[(u64, TestItem)]) -> ExtHashTable<TestItem> {
    let mut table = ExtHashTable::new();
    for (hash, item) in items {
        match table.entry(*hash, |v: &TestItem| v.eq_key(item)).unwrap() {
            ExtEntry::Vacant(entry) => {
                entry.insert(item.clone());
            }
            ExtEntry::Occupied(_) => unreachable!(),
        }
    }
    table
}

fn hashbrown_table_of<TestItem: KeyValuePair>(
    items: &[(u64, TestItem)],
) -> HashbrownHashTable<TestItem> {
    let mut table = HashbrownHashTable::with_capacity(items.len());
    for (hash, item) in items {
        match table.entry(*hash, |v: &TestItem| v.eq_key(item), |v| v.hash_key()) {
            HashbrownEntry::Vacant(entry) => {
                entry.insert(item.clone());
            }
            HashbrownEntry::Occupied(_) => unreachable!(),
        }
    }
    table
}

fn bench_insert_random<TestItem: KeyValuePair>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "insert_random_{}",
        core::any::type_name::<TestItem>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES {
        let hash_and_item = random_items::<TestItem>(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ext_hash/{size}"), |b| {
            b.iter_batched(
                || {
                    let mut hash_and_item = hash_and_item.clone();
                    hash_and_item.shuffle(&mut SmallRng::from_os_rng());
                    hash_and_item
                },
                |hash_and_item| {
                    let mut table = ExtHashTable::new();
                    for (hash, item) in hash_and_item {
                        match table.entry(hash, |v: &TestItem| v.eq_key(&item)).unwrap() {
                            ExtEntry::Vacant(entry) => {
                                black_box(entry.insert(item));
                            }
                            ExtEntry::Occupied(_) => unreachable!(),
                        }
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || {
                    let mut hash_and_item = hash_and_item.clone();
                    hash_and_item.shuffle(&mut SmallRng::from_os_rng());
                    hash_and_item
                },
                |hash_and_item| {
                    let mut table = HashbrownHashTable::with_capacity(0);
                    for (hash, item) in hash_and_item {
                        match table.entry(hash, |v: &TestItem| v.eq_key(&item), |v| v.hash_key()) {
                            HashbrownEntry::Vacant(entry) => {
                                black_box(entry.insert(item));
                            }
                            HashbrownEntry::Occupied(_) => unreachable!(),
                        }
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_hit<TestItem: KeyValuePair>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_hit_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES {
        let hash_and_item = random_items::<TestItem>(*size);
        let ext_table = ext_table_of(&hash_and_item);
        let hashbrown_table = hashbrown_table_of(&hash_and_item);

        let mut probes = hash_and_item.clone();
        probes.shuffle(&mut SmallRng::from_os_rng());

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ext_hash/{size}"), |b| {
            b.iter(|| {
                for (hash, item) in &probes {
                    black_box(ext_table.find(*hash, |v| v.eq_key(item)));
                }
            })
        });
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for (hash, item) in &probes {
                    black_box(hashbrown_table.find(*hash, |v| v.eq_key(item)));
                }
            })
        });
    }

    group.finish();
}

fn bench_find_miss<TestItem: KeyValuePair>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("find_miss_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES {
        let hash_and_item = random_items::<TestItem>(*size);
        let ext_table = ext_table_of(&hash_and_item);
        let hashbrown_table = hashbrown_table_of(&hash_and_item);

        // Fresh random keys miss with overwhelming probability.
        let probes = random_items::<TestItem>(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ext_hash/{size}"), |b| {
            b.iter(|| {
                for (hash, item) in &probes {
                    black_box(ext_table.find(*hash, |v| v.eq_key(item)));
                }
            })
        });
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for (hash, item) in &probes {
                    black_box(hashbrown_table.find(*hash, |v| v.eq_key(item)));
                }
            })
        });
    }

    group.finish();
}

fn bench_remove<TestItem: KeyValuePair>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("remove_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES {
        let hash_and_item = random_items::<TestItem>(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ext_hash/{size}"), |b| {
            b.iter_batched(
                || {
                    let mut order = hash_and_item.clone();
                    order.shuffle(&mut SmallRng::from_os_rng());
                    (ext_table_of(&hash_and_item), order)
                },
                |(mut table, order)| {
                    for (hash, item) in order {
                        black_box(table.remove(hash, |v| v.eq_key(&item)));
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter_batched(
                || {
                    let mut order = hash_and_item.clone();
                    order.shuffle(&mut SmallRng::from_os_rng());
                    (hashbrown_table_of(&hash_and_item), order)
                },
                |(mut table, order)| {
                    for (hash, item) in order {
                        let removed = match table.find_entry(hash, |v| v.eq_key(&item)) {
                            Ok(entry) => Some(entry.remove().0),
                            Err(_) => None,
                        };
                        black_box(removed);
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_iteration<TestItem: KeyValuePair>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("iteration_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES {
        let hash_and_item = random_items::<TestItem>(*size);
        let ext_table = ext_table_of(&hash_and_item);
        let hashbrown_table = hashbrown_table_of(&hash_and_item);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function(format!("ext_hash/{size}"), |b| {
            b.iter(|| {
                for item in ext_table.iter() {
                    black_box(item);
                }
            })
        });
        group.bench_function(format!("hashbrown/{size}"), |b| {
            b.iter(|| {
                for item in hashbrown_table.iter() {
                    black_box(item);
                }
            })
        });
    }

    group.finish();
}

#[derive(Clone, Copy)]
enum Operation {
    Find,
    Insert,
    Remove,
}

fn bench_mixed_zipf<TestItem: KeyValuePair>(c: &mut Criterion) {
    for exponent in [1.0, 1.3] {
        let mut group = c.benchmark_group(format!(
            "mixed_zipf_{:.01}_{}",
            exponent,
            core::any::type_name::<TestItem>()
        ));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        const KEY_SPACE_MULTIPLIER: u64 = 2;

        for size in SIZES {
            let mut rng = SmallRng::from_os_rng();
            let op_distr = Zipf::new(3.0, exponent).unwrap();

            let operations = (0..size * 3)
                .map(|_| {
                    let op_choice: f64 = rng.sample(op_distr);
                    if op_choice <= 1.0 {
                        Operation::Find
                    } else if op_choice <= 2.0 {
                        Operation::Insert
                    } else {
                        Operation::Remove
                    }
                })
                .collect::<Vec<Operation>>();

            let insert_distr = Zipf::new(*size as f32 - 1.0, 1.0).unwrap();
            let find_remove_distr =
                Zipf::new(*size as f32 * KEY_SPACE_MULTIPLIER as f32 - 1.0, 1.0).unwrap();

            group.throughput(Throughput::Elements(*size as u64 * 3));
            group.bench_function(format!("ext_hash/{size}"), |b| {
                b.iter_batched(
                    || {
                        let mut operations = operations.clone();
                        operations.shuffle(&mut SmallRng::from_os_rng());
                        operations
                    },
                    |operations| {
                        let mut table = ExtHashTable::<TestItem>::new();
                        for operation in operations {
                            match operation {
                                Operation::Insert => {
                                    let key = rng.sample(insert_distr) as u64;
                                    let item = TestItem::new(key);
                                    let hash = item.hash_key();
                                    match table.entry(hash, |v| v.eq_key(&item)).unwrap() {
                                        ExtEntry::Vacant(entry) => {
                                            black_box(entry.insert(item));
                                        }
                                        ExtEntry::Occupied(mut occupied) => {
                                            *occupied.get_mut() = item;
                                        }
                                    }
                                }
                                Operation::Remove => {
                                    let key = rng.sample(find_remove_distr) as u64;
                                    let item = TestItem::new(key);
                                    let hash = item.hash_key();
                                    black_box(table.remove(hash, |v| v.eq_key(&item)));
                                }
                                Operation::Find => {
                                    let key = rng.sample(find_remove_distr) as u64;
                                    let item = TestItem::new(key);
                                    let hash = item.hash_key();
                                    black_box(table.find(hash, |v| v.eq_key(&item)));
                                }
                            }
                        }
                        black_box(table)
                    },
                    BatchSize::SmallInput,
                )
            });

            group.bench_function(format!("hashbrown/{size}"), |b| {
                b.iter_batched(
                    || {
                        let mut operations = operations.clone();
                        operations.shuffle(&mut SmallRng::from_os_rng());
                        operations
                    },
                    |operations| {
                        let mut table = HashbrownHashTable::<TestItem>::with_capacity(0);
                        for operation in operations {
                            match operation {
                                Operation::Insert => {
                                    let key = rng.sample(insert_distr) as u64;
                                    let item = TestItem::new(key);
                                    let hash = item.hash_key();
                                    match table.entry(hash, |v| v.eq_key(&item), |v| v.hash_key())
                                    {
                                        HashbrownEntry::Vacant(entry) => {
                                            black_box(entry.insert(item));
                                        }
                                        HashbrownEntry::Occupied(mut occupied) => {
                                            *occupied.get_mut() = item;
                                        }
                                    }
                                }
                                Operation::Remove => {
                                    let key = rng.sample(find_remove_distr) as u64;
                                    let item = TestItem::new(key);
                                    let hash = item.hash_key();
                                    let removed = match table.find_entry(hash, |v| v.eq_key(&item))
                                    {
                                        Ok(entry) => Some(entry.remove().0),
                                        Err(_) => None,
                                    };
                                    black_box(removed);
                                }
                                Operation::Find => {
                                    let key = rng.sample(find_remove_distr) as u64;
                                    let item = TestItem::new(key);
                                    let hash = item.hash_key();
                                    black_box(table.find(hash, |v| v.eq_key(&item)));
                                }
                            }
                        }
                        black_box(table)
                    },
                    BatchSize::SmallInput,
                )
            });
        }

        group.finish();
    }
}

criterion_group!(
    benches,
    bench_insert_random::<TestItem>,
    bench_insert_random::<SmallTestItem>,
    bench_find_hit::<TestItem>,
    bench_find_hit::<SmallTestItem>,
    bench_find_miss::<TestItem>,
    bench_find_miss::<SmallTestItem>,
    bench_remove::<TestItem>,
    bench_remove::<SmallTestItem>,
    bench_iteration::<SmallTestItem>,
    bench_mixed_zipf::<SmallTestItem>,
);
criterion_main!(benches);
