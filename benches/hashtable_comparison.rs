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
use tomb_hash::ElementHasher;
use tomb_hash::HashMap as TombHashMap;
use tomb_hash::HashTable as TombHashTable;

trait KeyValuePair: Clone + Eq {
    fn new(key: u64) -> Self;

    fn hash_key(&self) -> u64;
}

/// Routes table hashing through the same SipHash the hashbrown side uses.
struct ItemHasher;

impl<T: KeyValuePair> ElementHasher<T> for ItemHasher {
    fn get_hash(item: &T) -> u64 {
        item.hash_key()
    }
}

type TombTable<T> = TombHashTable<T, ItemHasher>;

fn sip_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = SipHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone)]
struct TestItem {
    key: String,
    _value: u64,
}

impl PartialEq for TestItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TestItem {}

impl KeyValuePair for TestItem {
    fn new(key: u64) -> Self {
        black_box(Self {
            key: format!("key_{:016X}", key),
            _value: key,
        })
    }

    fn hash_key(&self) -> u64 {
        sip_hash(&self.key)
    }
}

#[derive(Clone, PartialEq, Eq)]
struct SmallTestItem {
    key: u64,
}

impl KeyValuePair for SmallTestItem {
    fn new(key: u64) -> Self {
        black_box(Self { key })
    }

    fn hash_key(&self) -> u64 {
        sip_hash(&self.key)
    }
}

#[derive(Clone)]
struct LargeTestItem {
    key: String,
    _value: [u8; 256],
}

impl PartialEq for LargeTestItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for LargeTestItem {}

impl KeyValuePair for LargeTestItem {
    fn new(key: u64) -> Self {
        let mut value = [0u8; 256];
        for (i, byte) in value.iter_mut().enumerate() {
            *byte = ((key >> ((i % 8) * 8)) & 0xFF) as u8;
        }
        black_box(Self {
            key: format!("key_{:064b}", key),
            _value: value,
        })
    }

    fn hash_key(&self) -> u64 {
        sip_hash(&self.key)
    }
}

const SIZES: &[usize] = &[
    (1 << 10),
    (1 << 11),
    (1 << 12),
    (1 << 13),
    (1 << 14),
    (1 << 15),
    (1 << 16),
    (1 << 17),
    (1 << 18),
];

#[derive(Clone, Copy)]
enum Operation {
    Insert,
    Remove,
    Find,
}

fn random_items<TestItem: KeyValuePair>(count: usize) -> Vec<TestItem> {
    let mut rng = OsRng;
    (0..count)
        .map(|_| TestItem::new(rng.try_next_u64().unwrap()))
        .collect()
}

fn sequential_items<TestItem: KeyValuePair>(count: usize) -> Vec<TestItem> {
    (0..count as u64).map(TestItem::new).collect()
}

fn hashbrown_with<TestItem: KeyValuePair>(items: &[TestItem]) -> HashbrownHashTable<TestItem> {
    let mut table = HashbrownHashTable::with_capacity(0);
    for item in items.iter().cloned() {
        match table.entry(item.hash_key(), |v: &TestItem| *v == item, |v| v.hash_key()) {
            HashbrownEntry::Vacant(entry) => {
                entry.insert(item);
            }
            HashbrownEntry::Occupied(_) => {}
        }
    }
    table
}

fn bench_insert_random<TestItem: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "insert_random_{}",
        core::any::type_name::<TestItem>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let items = random_items::<TestItem>(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function("tomb_hash", |b| {
            b.iter_batched(
                || {
                    let mut items = items.clone();
                    items.shuffle(&mut SmallRng::from_os_rng());
                    items
                },
                |items| {
                    let mut table = TombTable::<TestItem>::new();
                    for item in items {
                        black_box(table.add_if_not_existing(item));
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function("hashbrown", |b| {
            b.iter_batched(
                || {
                    let mut items = items.clone();
                    items.shuffle(&mut SmallRng::from_os_rng());
                    items
                },
                |items| {
                    let mut table = HashbrownHashTable::with_capacity(0);
                    for item in items {
                        let hash = item.hash_key();
                        match table.entry(hash, |v: &TestItem| *v == item, |v| v.hash_key()) {
                            HashbrownEntry::Vacant(entry) => {
                                black_box(entry.insert(item));
                            }
                            HashbrownEntry::Occupied(_) => {}
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

fn bench_collect_find<TestItem: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "collect_find_{}",
        core::any::type_name::<TestItem>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<TestItem>(*size);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function("tomb_hash", |b| {
            b.iter_batched(
                || items.clone(),
                |items| {
                    let mut table = TombTable::<TestItem>::new();
                    for item in items.iter().cloned() {
                        table.add(item);
                    }
                    for item in items.iter() {
                        black_box(table.find(item));
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function("hashbrown", |b| {
            b.iter_batched(
                || items.clone(),
                |items| {
                    let table = hashbrown_with(&items);
                    for item in items.iter() {
                        black_box(table.find(item.hash_key(), |v| v == item));
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_find_hit_miss<TestItem: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!(
        "find_hit_miss_{}",
        core::any::type_name::<TestItem>()
    ));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let items = random_items::<TestItem>(*size * 2);
        let (stored, probes) = items.split_at(*size);
        let mut probes = probes.iter().chain(stored).cloned().collect::<Vec<_>>();
        probes.shuffle(&mut SmallRng::from_os_rng());

        let tomb_table: TombTable<TestItem> = stored.iter().cloned().collect();
        let hashbrown_table = hashbrown_with(stored);

        group.throughput(Throughput::Elements(probes.len() as u64));
        group.bench_function("tomb_hash", |b| {
            b.iter(|| {
                for item in probes.iter() {
                    black_box(tomb_table.contains(item));
                }
            })
        });

        group.bench_function("hashbrown", |b| {
            b.iter(|| {
                for item in probes.iter() {
                    black_box(hashbrown_table.find(item.hash_key(), |v| v == item).is_some());
                }
            })
        });
    }

    group.finish();
}

fn bench_remove<TestItem: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("remove_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<TestItem>(*size);
        let tomb_table: TombTable<TestItem> = items.iter().cloned().collect();
        let hashbrown_table = hashbrown_with(&items);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function("tomb_hash", |b| {
            b.iter_batched(
                || tomb_table.clone(),
                |mut table| {
                    for item in items.iter() {
                        black_box(table.remove_if_exists(item));
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function("hashbrown", |b| {
            b.iter_batched(
                || hashbrown_table.clone(),
                |mut table| {
                    for item in items.iter() {
                        let removed = match table.find_entry(item.hash_key(), |v| v == item) {
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

fn bench_iteration<TestItem: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("iteration_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let items = sequential_items::<TestItem>(*size);
        let tomb_table: TombTable<TestItem> = items.iter().cloned().collect();
        let hashbrown_table = hashbrown_with(&items);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_function("tomb_hash", |b| {
            b.iter(|| {
                for item in tomb_table.iter() {
                    black_box(item);
                }
            })
        });

        group.bench_function("hashbrown", |b| {
            b.iter(|| {
                for item in hashbrown_table.iter() {
                    black_box(item);
                }
            })
        });
    }

    group.finish();
}

fn bench_churn<TestItem: KeyValuePair, const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("churn_{}", core::any::type_name::<TestItem>()));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        // Every key appears twice: the first occurrence inserts, the second
        // removes, which stresses tombstone reuse and purging.
        let insertions_and_removals = sequential_items::<TestItem>(*size)
            .into_iter()
            .flat_map(|item| [item.clone(), item])
            .collect::<Vec<TestItem>>();

        group.throughput(Throughput::Elements(*size as u64 * 2));
        group.bench_function("tomb_hash", |b| {
            b.iter_batched(
                || {
                    let mut items = insertions_and_removals.clone();
                    items.shuffle(&mut SmallRng::from_os_rng());
                    items
                },
                |items| {
                    let mut table = TombTable::<TestItem>::new();
                    for item in items {
                        if table.contains(&item) {
                            black_box(table.take(&item));
                        } else {
                            table.add(item);
                        }
                    }
                    black_box(table)
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function("hashbrown", |b| {
            b.iter_batched(
                || {
                    let mut items = insertions_and_removals.clone();
                    items.shuffle(&mut SmallRng::from_os_rng());
                    items
                },
                |items| {
                    let mut table = HashbrownHashTable::<TestItem>::with_capacity(0);
                    for item in items {
                        match table.entry(item.hash_key(), |v| *v == item, |v| v.hash_key()) {
                            HashbrownEntry::Vacant(entry) => {
                                black_box(entry.insert(item));
                            }
                            HashbrownEntry::Occupied(entry) => {
                                black_box(entry.remove().0);
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

fn bench_mixed_probabilistic_zipf<TestItem: KeyValuePair, const MAX_SIZE: usize>(
    c: &mut Criterion,
) {
    for exponent in [1.0, 1.3] {
        let mut group = c.benchmark_group(format!(
            "mixed_probabilistic_zipf_{:.01}_{}",
            exponent,
            core::any::type_name::<TestItem>()
        ));
        group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

        const KEY_SPACE_MULTIPLIER: u64 = 2;

        for size in SIZES[..=MAX_SIZE].iter() {
            let mut rng = SmallRng::from_os_rng();
            let op_distr = Zipf::new(3.0, exponent).unwrap();

            let operations = (0..*size * 3)
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
            group.bench_function("tomb_hash", |b| {
                b.iter_batched(
                    || {
                        let mut operations = operations.clone();
                        operations.shuffle(&mut SmallRng::from_os_rng());
                        operations
                    },
                    |operations| {
                        let mut table = TombTable::<TestItem>::new();
                        for operation in operations {
                            match operation {
                                Operation::Insert => {
                                    let item = TestItem::new(rng.sample(insert_distr) as u64);
                                    black_box(table.add_if_not_existing(item));
                                }
                                Operation::Remove => {
                                    let item = TestItem::new(rng.sample(find_remove_distr) as u64);
                                    black_box(table.remove_if_exists(&item));
                                }
                                Operation::Find => {
                                    let item = TestItem::new(rng.sample(find_remove_distr) as u64);
                                    black_box(table.find(&item));
                                }
                            }
                        }
                        black_box(table)
                    },
                    BatchSize::SmallInput,
                )
            });

            group.bench_function("hashbrown", |b| {
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
                                    let item = TestItem::new(rng.sample(insert_distr) as u64);
                                    let hash = item.hash_key();
                                    match table.entry(hash, |v| *v == item, |v| v.hash_key()) {
                                        HashbrownEntry::Vacant(entry) => {
                                            black_box(entry.insert(item));
                                        }
                                        HashbrownEntry::Occupied(_) => {}
                                    }
                                }
                                Operation::Remove => {
                                    let item = TestItem::new(rng.sample(find_remove_distr) as u64);
                                    let result =
                                        match table.find_entry(item.hash_key(), |v| *v == item) {
                                            Ok(entry) => Some(entry.remove().0),
                                            Err(_) => None,
                                        };
                                    black_box(result);
                                }
                                Operation::Find => {
                                    let item = TestItem::new(rng.sample(find_remove_distr) as u64);
                                    black_box(table.find(item.hash_key(), |v| *v == item));
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

/// Engine-style upserts: a component registry keyed by id, where most
/// lookups hit an existing entry.
fn bench_map_get_or_add<const MAX_SIZE: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group("map_get_or_add");
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic));

    for size in SIZES[..=MAX_SIZE].iter() {
        let mut rng = SmallRng::from_os_rng();
        let keys = (0..*size * 4)
            .map(|_| rng.random_range(0..*size as u64))
            .collect::<Vec<u64>>();

        group.throughput(Throughput::Elements(keys.len() as u64));
        group.bench_function("tomb_hash", |b| {
            b.iter(|| {
                let mut map = TombHashMap::<u64, u64>::new();
                for key in keys.iter() {
                    *map.get_or_add(*key) += 1;
                }
                black_box(map)
            })
        });

        group.bench_function("hashbrown", |b| {
            b.iter(|| {
                let mut map = hashbrown::HashMap::<u64, u64>::new();
                for key in keys.iter() {
                    *map.entry(*key).or_default() += 1;
                }
                black_box(map)
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mixed_probabilistic_zipf::<SmallTestItem, 8>,
    bench_mixed_probabilistic_zipf::<TestItem, 8>,
    bench_mixed_probabilistic_zipf::<LargeTestItem, 5>,
    bench_churn::<SmallTestItem, 8>,
    bench_churn::<TestItem, 8>,
    bench_churn::<LargeTestItem, 5>,
    bench_collect_find::<SmallTestItem, 8>,
    bench_collect_find::<TestItem, 8>,
    bench_collect_find::<LargeTestItem, 5>,
    bench_insert_random::<SmallTestItem, 8>,
    bench_insert_random::<TestItem, 8>,
    bench_insert_random::<LargeTestItem, 5>,
    bench_find_hit_miss::<SmallTestItem, 8>,
    bench_find_hit_miss::<TestItem, 8>,
    bench_find_hit_miss::<LargeTestItem, 5>,
    bench_remove::<SmallTestItem, 8>,
    bench_remove::<TestItem, 8>,
    bench_remove::<LargeTestItem, 5>,
    bench_iteration::<SmallTestItem, 8>,
    bench_iteration::<TestItem, 8>,
    bench_iteration::<LargeTestItem, 5>,
    bench_map_get_or_add::<8>,
);

criterion_main!(benches);
