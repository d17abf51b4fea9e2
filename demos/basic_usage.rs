//! Opens a snapshot-mode store, performs point operations and a
//! batch, then reopens to show the state survived the round trip.

use codex_store::{Options, Store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("demo.db");

    {
        let store = Store::open(&path, Options::default())?;
        store.set("greeting", &"hello, codex")?;
        store.set("count", &1u32)?;

        let batch = store.new_batch();
        batch.set("count", &2u32)?;
        batch.set("extra", &"added in a batch")?;
        batch.execute()?;

        println!("keys before close: {:?}", store.keys());
        store.close()?;
    }

    let store = Store::open(&path, Options::default())?;
    println!("greeting = {}", store.get::<String>("greeting")?);
    println!("count    = {}", store.get::<u32>("count")?);
    println!("has extra: {}", store.has("extra"));
    println!("stats: {:?}", store.stats());

    Ok(())
}
