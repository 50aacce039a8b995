//! Live ledger example.
//!
//! Polls the public unconfirmed-transactions endpoint, then prints a few
//! blocking and recycled draws along with the pool's health.
//!
//! Run: `cargo run -p blockrandom-core --features http --example basic`

use blockrandom_core::{BlockRandom, FeedConfig};

fn main() -> blockrandom_core::Result<()> {
    env_logger::init();

    let rng = BlockRandom::from_config(FeedConfig::default())?;

    // Waits for the first ledger batch.
    let fresh = rng.rand_bytes(16)?;
    println!("Ledger bytes (hex): {}", hex::encode(&fresh));

    println!("Die roll:           {}", rng.recycled_int(1, 7)?);
    println!("Coin flip:          {}", rng.recycled_bool()?);
    println!("Uniform [0, 10):    {:.4}", rng.recycled_uniform(0.0, 10.0)?);

    let deck: Vec<u8> = (1..=10).collect();
    println!("Shuffled:           {:?}", rng.recycled_shuffled(&deck)?);
    println!("Sample of 3:        {:?}", rng.recycled_sample(deck.iter(), 3)?);

    let health = rng.health();
    println!(
        "\nPool: {}/{} primary, {}/{} spare, watermark {}",
        health.pool.primary_len,
        health.pool.capacity,
        health.pool.spare_len,
        health.pool.capacity,
        health.pool.watermark
    );
    println!(
        "Feed: {} polls, {} accepted, {} fallback uses",
        health.feed.polls, health.feed.accepted_batches, health.feed.fallback_uses
    );
    Ok(())
}
