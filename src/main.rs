mod errors;
mod generator;
mod grid;
mod palette;
mod renderer;
mod settings;

use std::collections::HashMap;
use std::env;
use std::process;
use std::str::FromStr;
use std::time::SystemTime;

use errors::{MapError, MapResult};
use generator::MapGenerator;
use grid::Grid;
use palette::Material;
use renderer::MapRenderer;

struct CliOptions {
    width: i64,
    height: i64,
    seed: Option<u64>,
    scale: u32,
    output: Option<String>,
    json: Option<String>,
    ascii: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        CliOptions {
            width: 128,
            height: 64,
            seed: None,
            scale: 4,
            output: None,
            json: None,
            ascii: false,
        }
    }
}

fn numeric_arg<T: FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    *i += 1;
    match args.get(*i).map(|value| value.parse::<T>()) {
        Some(Ok(value)) => value,
        _ => {
            eprintln!("Error: {} expects a numeric value", flag);
            process::exit(1);
        }
    }
}

fn parse_args() -> CliOptions {
    let args: Vec<String> = env::args().collect();
    let mut opts = CliOptions::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--width" => opts.width = numeric_arg(&args, &mut i, "--width"),
            "--height" => opts.height = numeric_arg(&args, &mut i, "--height"),
            "--seed" => opts.seed = Some(numeric_arg(&args, &mut i, "--seed")),
            "--scale" => opts.scale = numeric_arg(&args, &mut i, "--scale"),
            "--output" => {
                i += 1;
                opts.output = args.get(i).cloned();
            }
            "--json" => {
                i += 1;
                opts.json = args.get(i).cloned();
            }
            "--ascii" => opts.ascii = true,
            "--help" => {
                println!("Terrain Map Generator");
                println!("\nUsage: terramap-cli [OPTIONS]");
                println!("\nOptions:");
                println!("  --width <N>      Map width in cells (default: 128)");
                println!("  --height <N>     Map height in cells (default: 64)");
                println!("  --seed <N>       Generation seed (default: system time)");
                println!("  --scale <N>      Output pixels per cell (default: 4)");
                println!("  --output <PATH>  PNG output path (default: terrain_map_<seed>.png)");
                println!("  --json <PATH>    Also export the raw grid as JSON");
                println!("  --ascii          Print an ASCII preview to the terminal");
                println!("  --help           Show this help message");
                println!("\nExample:");
                println!("  terramap-cli --width 256 --height 128 --seed 42 --output map.png");
                process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    opts
}

/// Rejects non-positive resolutions before any generation work happens.
fn validate_resolution(width: i64, height: i64) -> Result<(usize, usize), MapError> {
    if width <= 0 || height <= 0 {
        return Err(MapError::InvalidResolution { width, height });
    }
    Ok((width as usize, height as usize))
}

fn material_symbol(material: Material) -> (&'static str, char) {
    // (ANSI color, glyph)
    match material {
        Material::Grass => ("\x1b[92m", ','),
        Material::Water => ("\x1b[34m", '~'),
        Material::Desert => ("\x1b[93m", '='),
        Material::Savanna => ("\x1b[33m", '"'),
        Material::Jungle => ("\x1b[32m", '♣'),
        Material::Mycelium => ("\x1b[35m", '%'),
        Material::Beach => ("\x1b[93m", '.'),
        Material::Plant => ("\x1b[32m", 't'),
        Material::Cactus => ("\x1b[92m", 'i'),
        Material::BrownMushroom => ("\x1b[33m", 'm'),
        Material::RedMushroom => ("\x1b[91m", 'M'),
        Material::House => ("\x1b[91m", '#'),
        Material::Road => ("\x1b[90m", '+'),
        Material::Bridge => ("\x1b[33m", 'H'),
    }
}

fn print_map_ascii(grid: &Grid) {
    // Sample large maps down to roughly terminal size.
    let sample_x = (grid.width() / 100).max(1);
    let sample_y = (grid.height() / 40).max(1);

    for y in (0..grid.height()).step_by(sample_y) {
        for x in (0..grid.width()).step_by(sample_x) {
            let (color, glyph) = material_symbol(grid.get(x as i32, y as i32).material);
            print!("{}{}\x1b[0m", color, glyph);
        }
        println!();
    }
}

fn print_map_info(grid: &Grid) {
    let mut counts: HashMap<Material, usize> = HashMap::new();
    for y in 0..grid.height() as i32 {
        for x in 0..grid.width() as i32 {
            *counts.entry(grid.get(x, y).material).or_insert(0) += 1;
        }
    }

    let total = (grid.width() * grid.height()) as f64;
    println!("\nMaterial distribution:");
    for material in Material::ALL {
        if let Some(count) = counts.get(&material) {
            println!("  {:?} - {:.1}%", material, *count as f64 / total * 100.0);
        }
    }
}

fn export_json(grid: &Grid, path: &str) -> MapResult<()> {
    let json = serde_json::to_string_pretty(grid)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn main() {
    env_logger::init();
    let opts = parse_args();

    let (width, height) = match validate_resolution(opts.width, opts.height) {
        Ok(dims) => dims,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let seed = opts.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    println!("Generating {}x{} map (seed {}) ...", width, height, seed);
    let mut generator = MapGenerator::new(seed);
    let grid = match generator.generate(width, height) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if opts.ascii {
        print_map_ascii(&grid);
    }
    print_map_info(&grid);

    if let Some(path) = &opts.json {
        match export_json(&grid, path) {
            Ok(_) => println!("Map data saved as: {}", path),
            Err(e) => {
                eprintln!("Error writing map data: {}", e);
                process::exit(1);
            }
        }
    }

    let output = opts
        .output
        .unwrap_or_else(|| format!("terrain_map_{}.png", seed));
    match MapRenderer::save_png(&grid, opts.scale, &output) {
        Ok(_) => println!("Map saved as: {}", output),
        Err(e) => {
            eprintln!("Error saving map: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_resolution_accepts_positive_dimensions() {
        assert_eq!(validate_resolution(128, 64).unwrap(), (128, 64));
        assert_eq!(validate_resolution(1, 1).unwrap(), (1, 1));
    }

    #[test]
    fn test_validate_resolution_rejects_non_positive_dimensions() {
        assert!(validate_resolution(0, 64).is_err());
        assert!(validate_resolution(128, 0).is_err());
        assert!(validate_resolution(-3, 64).is_err());
    }

    #[test]
    fn test_common_terrain_glyphs_are_distinct() {
        let terrain = [
            Material::Grass,
            Material::Water,
            Material::Desert,
            Material::Savanna,
            Material::Jungle,
            Material::Mycelium,
            Material::Beach,
        ];
        let mut glyphs: Vec<char> = terrain.iter().map(|&m| material_symbol(m).1).collect();
        glyphs.sort_unstable();
        glyphs.dedup();
        assert_eq!(glyphs.len(), terrain.len());
    }
}
