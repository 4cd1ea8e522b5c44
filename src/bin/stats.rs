use clap::Parser;
use sociograph::Community;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Print summary statistics of a saved community document")]
struct Args {
    /// Path to a community document
    #[arg(default_value = "community.json")]
    document: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let community = Community::load(&args.document)?;

    println!("\n=== Community statistics: {} ===\n", args.document.display());
    println!("Users:                   {}", community.user_count());
    println!("Groups:                  {}", community.group_count());
    println!("Cities:                  {}", community.city_count());
    println!("Universities:            {}", community.university_count());
    println!("Directed friend entries: {}", community.edge_count());
    println!("Undirected friendships:  {}", community.edge_count() / 2);

    let geocoded = community
        .cities()
        .filter(|(_, city)| city.latitude.is_some())
        .count();
    println!("Geocoded cities:         {geocoded}");

    // Hop-distance histogram.
    let mut layers: BTreeMap<u32, usize> = BTreeMap::new();
    let mut unlabelled = 0usize;
    for user in community.users() {
        match user.layer() {
            Some(layer) => *layers.entry(layer).or_default() += 1,
            None => unlabelled += 1,
        }
    }

    if !layers.is_empty() {
        println!("\nUsers per layer:");
        for (layer, count) in &layers {
            println!("  {layer}: {count}");
        }
    }
    if unlabelled > 0 {
        println!("  (no layer recorded: {unlabelled})");
    }

    // Most common cities among users.
    let mut by_city: BTreeMap<&str, usize> = BTreeMap::new();
    for user in community.users() {
        if let Some(city) = user.city() {
            *by_city.entry(city.name.as_str()).or_default() += 1;
        }
    }
    let mut ranked: Vec<_> = by_city.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    if !ranked.is_empty() {
        println!("\nTop cities:");
        for (name, count) in ranked.iter().take(5) {
            println!("  {name}: {count}");
        }
    }

    println!();
    Ok(())
}
