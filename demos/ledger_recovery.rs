//! Shows the ledger engine's self-healing contract: trailing garbage
//! appended after a clean close is truncated away on the next open,
//! and every durably-written entry survives.

use codex_store::{Options, Store};
use std::fs::OpenOptions;
use std::io::Write;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    let opts = Options {
        ledger_mode: true,
        ..Options::default()
    };

    {
        let store = Store::open(&path, opts.clone())?;
        store.set("a", &1)?;
        store.set("b", &2)?;
        store.set("a", &3)?;
        store.delete("b")?;
        store.close()?;
    }

    let good_len = std::fs::metadata(&path)?.len();
    {
        let mut file = OpenOptions::new().append(true).open(&path)?;
        file.write_all(&[0xFF; 9])?;
    }
    println!(
        "ledger grew from {} to {} bytes before reopen",
        good_len,
        std::fs::metadata(&path)?.len()
    );

    let store = Store::open(&path, opts)?;
    println!("a = {}", store.get::<i32>("a")?);
    println!("b present: {}", store.has("b"));
    println!(
        "ledger truncated back to {} bytes",
        std::fs::metadata(&path)?.len()
    );

    Ok(())
}
