//! Combines AES-GCM encryption with zstd compression and rotating
//! snapshot backups, then shows that the wrong key fails to open the
//! store.

use codex_store::{Compression, ErrorKind, Options, Store};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("secure.db");
    let key = vec![0x42u8; 32];

    let opts = Options {
        encryption_key: Some(key.clone()),
        num_backups: 2,
        compression: Compression::Zstd,
        compression_level: 3,
        ..Options::default()
    };

    {
        let store = Store::open(&path, opts.clone())?;
        for generation in 1..=4 {
            store.set("generation", &generation)?;
        }
        store.close()?;
    }

    println!("backup files present:");
    for n in 1..=2 {
        let bak = format!("{}.bak.{n}", path.display());
        println!("  {bak}: {}", std::path::Path::new(&bak).exists());
    }

    let wrong_key_opts = Options {
        encryption_key: Some(vec![0x24u8; 32]),
        ..opts
    };
    match Store::open(&path, wrong_key_opts) {
        Err(e) if e.is(ErrorKind::Encryption) => {
            println!("reopening with the wrong key correctly failed: {e}");
        }
        other => panic!("expected an Encryption error, got {other:?}"),
    }

    Ok(())
}
