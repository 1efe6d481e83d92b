use clap::Parser;
use tomb_hash::HashTable;
use tomb_hash::InsertResult;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target-capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Percentage of elements removed after filling, leaving tombstones.
    #[arg(short = 'r', long = "remove-percent", default_value_t = 50)]
    remove_percent: usize,

    /// Add-then-remove cycles run after the removal pass.
    #[arg(long = "churn", default_value_t = 0)]
    churn: usize,
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: HashTable<u64> = HashTable::with_capacity(args.target_capacity);

    println!(
        "Actual capacity: {} ({} slots)",
        table.capacity(),
        table.slot_count()
    );
    println!("Filling table with u64 values...");

    let num_values = table.capacity() as u64;
    for value in 0..num_values {
        match table.add_if_not_existing(value) {
            InsertResult::InsertedNewEntry => {}
            InsertResult::EntryAlreadyExists => {
                panic!("Value already exists in table: {}", value);
            }
        }
    }

    println!("Inserted {} values into table", table.len());
    table.probe_histogram().print();
    table.debug_stats().print();

    let num_removed = num_values * args.remove_percent.min(100) as u64 / 100;
    for value in 0..num_removed {
        table.remove(&value);
    }
    println!();
    println!("Removed {} values", num_removed);
    table.debug_stats().print();

    let mut next = num_values;
    for cycle in 0..args.churn as u64 {
        table.add(next);
        table.remove(&(num_removed + cycle));
        next += 1;
    }
    if args.churn > 0 {
        println!();
        println!("After {} churn cycles", args.churn);
        table.probe_histogram().print();
        table.debug_stats().print();
    }

    table.shrink_to_fit();
    println!();
    println!("After shrink_to_fit");
    table.debug_stats().print();
}
