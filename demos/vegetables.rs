//! Demo driver: one writer task fills the concurrent table with numbered
//! vegetable names while two readers repeatedly scan it, and an updater
//! swaps one entry once it appears.
//!
//! Run with `cargo run --example vegetables`.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cwtable::sync::Table;

const VEGETABLES: [&str; 17] = [
    "broccoli",
    "cauliflower",
    "carrot",
    "sorrel",
    "baby turnip",
    "beet",
    "brussel sprout",
    "cabbage",
    "plantain",
    "spinach",
    "grape leaves",
    "lime leaves",
    "corn",
    "radish",
    "cucumber",
    "raddichio",
    "lima beans",
];

fn main() {
    let table: Arc<Table<u64, String>> = Arc::new(Table::new());
    let total = VEGETABLES.len() as u64;
    let mut tasks = Vec::new();

    // Writer: insert every vegetable, retrying lost races.
    {
        let table = Arc::clone(&table);
        tasks.push(thread::spawn(move || {
            for (i, name) in VEGETABLES.iter().enumerate() {
                let key = i as u64 + 1;
                loop {
                    match table.insert(key, (*name).to_string()) {
                        Ok(true) => break,
                        Ok(false) => continue,
                        Err(e) => {
                            eprintln!("insert({key}) failed: {e}");
                            break;
                        }
                    }
                }
            }
            println!("writer stored {} items", table.len());
        }));
    }

    // Two readers: scan whatever is visible, one ascending and one
    // descending, until the writer is done.
    for descending in [false, true] {
        let table = Arc::clone(&table);
        tasks.push(thread::spawn(move || {
            loop {
                let items = table.len() as u64;
                let mut output = String::new();
                let keys: Vec<u64> = if descending {
                    (1..=items).rev().collect()
                } else {
                    (1..=items).collect()
                };
                for key in keys {
                    if let Ok(value) = table.search(&key) {
                        output.push_str(&format!("[{value}] "));
                    }
                }
                println!("reader saw {items} items: {output}");
                if items >= total {
                    break;
                }
            }
        }));
    }

    // Updater: once the cucumber shows up, replace it.
    {
        let table = Arc::clone(&table);
        tasks.push(thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            for key in 1..=total {
                if table.search(&key) == Ok("cucumber".to_string()) {
                    match table.update(&key, "green bean".to_string()) {
                        Ok(applied) => println!("updated cucumber -> green bean: {applied}"),
                        Err(e) => eprintln!("update({key}) failed: {e}"),
                    }
                }
            }
        }));
    }

    for task in tasks {
        task.join().unwrap();
    }

    println!("\nfinal contents:");
    for key in 1..=total {
        match table.search(&key) {
            Ok(value) => println!("  {key}: {value}"),
            Err(e) => println!("  {key}: <{e}>"),
        }
    }
}
