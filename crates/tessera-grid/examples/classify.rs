use tessera_grid::map::{BorderDirection, CoordinateMap, CoordinateType, GridLevelConfig, GridPos, WorldPos};
use tessera_grid::seeds::rng_from_str;

fn main() {
    // A 9x9 region with one ring of closed boundary, 16 world units per cell,
    // with its minimum corner at (-72, 0, -72).
    let config = GridLevelConfig::new(WorldPos::new(-72.0, 0.0, -72.0), 9, 16.0, 1);
    let mut map = CoordinateMap::new(config).unwrap();

    println!("Default classification:");
    println!("{}", map);
    for t in CoordinateType::ALL {
        println!("{:>7}: {}", t.to_string(), map.count_of(t));
    }

    // No neighbor to the north, so wall that side off and recover the open corners.
    map.close_map_border(BorderDirection::North);
    map.set_inactive_corners_to_type(CoordinateType::Border);
    println!("\nAfter closing the north border:");
    println!("{}", map);

    let exits = map.generate_random_exits(&mut rng_from_str("alpha"));
    println!("Cut {} exits:", exits.len());
    for exit in &exits {
        println!("  {} on the {:?} border", exit, map.border_of(*exit));
    }

    // A neighbor to the south with an exit on its north edge at x = 4.
    let mut neighbor = CoordinateMap::new(GridLevelConfig::new(WorldPos::new(-72.0, 0.0, -216.0), 9, 16.0, 1)).unwrap();
    neighbor.convert_coordinate_to_exit(GridPos::new(4, 7));
    let neighbor_exit = neighbor.exits_on(BorderDirection::North).next().unwrap();
    match map.create_matching_exit(BorderDirection::North, neighbor_exit) {
        Ok(Some(pos)) => println!("Matching exit cut at {}", pos),
        Ok(None) => println!("Matching position was already taken"),
        Err(e) => println!("Error mirroring exit: {}", e),
    }
    println!("\n{}", map);

    let sample = WorldPos::new(-40.0, 0.0, 10.0);
    if let Some(grid_p) = map.world_to_grid(sample) {
        println!("World position ({:.1}, {:.1}) maps to grid position {}", sample.x, sample.z, grid_p);
        if let Some(back) = map.grid_to_world(grid_p) {
            println!("Grid position {} has its minimum corner at ({:.1}, {:.1})", grid_p, back.x, back.z);
        }
    }
    let (min_p, max_p) = map.world_bounds();
    println!("Map bounds: ({:.1}, {:.1}) to ({:.1}, {:.1})", min_p.x, min_p.z, max_p.x, max_p.z);
}
