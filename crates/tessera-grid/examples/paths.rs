use tessera_grid::assign_height_ramp;
use tessera_grid::map::{CoordinateMap, CoordinateType, GridLevelConfig, WorldPos};
use tessera_grid::seeds::{derive_seed, rng_for, seed_from_str};
use tessera_grid::zone::ZoneShape;

fn main() {
    let master = seed_from_str("alpha");
    println!("Master seed: {:#018x}, paths seed: {:#018x}", master, derive_seed(master, "paths"));

    for randomness in [0.0, 0.5, 1.0] {
        let config = GridLevelConfig::new(WorldPos::default(), 15, 1.0, 1);
        let mut map = CoordinateMap::new(config).unwrap().with_path_randomness(randomness);

        let exits = map.generate_random_exits(&mut rng_for(master, "exits"));
        let built = map.generate_paths_between_exits(&mut rng_for(master, "paths"));
        println!("\nPath randomness {:.1}: {} exits, {} paths", randomness, exits.len(), built);

        for (i, path) in map.paths().iter().enumerate() {
            let heights = assign_height_ramp(path.positions(), 0, 3);
            println!(
                "  Path {}: {} -> {}, {} cells, {} turns, heights {:?}",
                i,
                path.start(),
                path.end(),
                path.len(),
                path.turns().len(),
                heights
            );
        }

        let zones = map.generate_random_zones(2, 4, &ZoneShape::ALL, &mut rng_for(master, "zones"));
        println!("  Placed {} zones:", zones);
        for zone in map.zones() {
            match zone.connection() {
                Some(path) => println!("    Zone {} ({}) at {} joins the network at {}", zone.id(), zone.shape(), zone.center(), path.end()),
                None => println!("    Zone {} ({}) at {} is unconnected", zone.id(), zone.shape(), zone.center()),
            }
        }
        println!("  {} path cells, {} zone cells", map.count_of(CoordinateType::Path), map.count_of(CoordinateType::Zone));
        println!("{}", map);
    }
}
