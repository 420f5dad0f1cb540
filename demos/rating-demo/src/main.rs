use std::collections::HashSet;

use csvdb::InMemoryStorage;
use ratings::{
    FilterMode, Item, ItemKey, Partition, Rater, RatingRecord, RatingStore, Scores, SessionCursor, Step,
};

fn item(method: &str, filename: &str) -> Item {
    Item {
        modality: "CT".into(),
        method: method.into(),
        filename: filename.into(),
        source_location: format!("resultselect/CT/{method}/{filename}").into(),
    }
}

fn main() {
    println!("=== Rating Demo: CT, two images, one rater ===\n");

    let storage = InMemoryStorage::new();
    let mut store = RatingStore::open(storage.clone(), "CT", Partition::PerRater.scope()).unwrap();
    let items = vec![item("m1", "img1.png"), item("m1", "img2.png")];
    let keys: Vec<ItemKey> = items.iter().map(Item::key).collect();
    let mut cursor = SessionCursor::new(items);
    let alice = Rater::new("Alice", "General Hospital", 3.5);

    // 1. First submission
    println!("--- Submit img1.png ---");
    let current = cursor.current().unwrap().clone();
    let record = RatingRecord::new(alice.clone(), &current, Scores::new(4, 5, 3, 4)).stamped();
    let res = store.upsert(record).unwrap();
    println!("Outcome:  {:?} (dataset size {})", res.outcome, res.dataset_len);
    let p = store.progress(&keys, Some("Alice"));
    println!("Progress: {}/{} ({:.0}%)", p.completed, p.total, p.ratio() * 100.0);
    match cursor.advance() {
        Step::At(i) => println!("Cursor:   {} ({})", i, cursor.current().unwrap().filename),
        Step::End => println!("Cursor:   complete"),
    }

    // 2. Re-rate the same image
    println!("\n--- Re-submit img1.png ---");
    let record = RatingRecord::new(alice.clone(), &current, Scores::new(2, 3, 2, 3)).stamped();
    let res = store.upsert(record).unwrap();
    println!("Outcome:  {:?} (dataset size {})", res.outcome, res.dataset_len);
    let stored = store.find("Alice", "img1.png", "m1").unwrap();
    println!("Stored:   {:?}", stored.scores);
    let p = store.progress(&keys, Some("Alice"));
    println!("Progress: {}/{} (not double-counted)", p.completed, p.total);

    // 3. Filters and skipping
    println!("\n--- Filters ---");
    let rated: HashSet<ItemKey> = store.rated_keys(Some("Alice"));
    for mode in [FilterMode::Rated, FilterMode::Unrated] {
        let names: Vec<&str> = cursor
            .reapply_filter(mode, &rated)
            .iter()
            .map(|i| i.filename.as_str())
            .collect();
        println!("{:?}: {:?}", mode, names);
    }
    cursor.reapply_filter(FilterMode::All, &rated);
    println!("skip_rated from start -> {:?}", cursor.skip_rated(&rated));

    // 4. What reached storage
    println!("\n--- Dataset ---");
    let bytes = storage.snapshot().unwrap_or_default();
    print!("{}", String::from_utf8_lossy(&bytes));
}
