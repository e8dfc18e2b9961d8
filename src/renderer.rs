use image::{Rgb, RgbImage};

use crate::errors::MapResult;
use crate::grid::Grid;

pub struct MapRenderer;

impl MapRenderer {
    /// Renders the grid to an RGB image, `scale` output pixels per cell.
    ///
    /// A cell is read as an HSV triple: hue and saturation from its material,
    /// value from its height. The generator keeps heights in [0, 100] and
    /// materials inside the palette, so the conversion never sees
    /// out-of-range input.
    pub fn render_to_image(grid: &Grid, scale: u32) -> RgbImage {
        let scale = scale.max(1);
        let mut img = RgbImage::new(grid.width() as u32 * scale, grid.height() as u32 * scale);
        for y in 0..grid.height() as u32 {
            for x in 0..grid.width() as u32 {
                let cell = grid.get(x as i32, y as i32);
                let rgb = hsv_to_rgb(
                    cell.material.hue() as f64,
                    cell.material.saturation() as f64 / 100.0,
                    cell.height / 100.0,
                );
                for py in y * scale..(y + 1) * scale {
                    for px in x * scale..(x + 1) * scale {
                        img.put_pixel(px, py, rgb);
                    }
                }
            }
        }
        img
    }

    pub fn save_png(grid: &Grid, scale: u32, path: &str) -> MapResult<()> {
        let img = Self::render_to_image(grid, scale);
        img.save(path)?;
        Ok(())
    }
}

/// Standard HSV to RGB conversion; hue in degrees [0, 360), saturation and
/// value in [0, 1].
fn hsv_to_rgb(hue: f64, saturation: f64, value: f64) -> Rgb<u8> {
    let c = value * saturation;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = value - c;

    let (r, g, b) = match hue as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    Rgb([
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::Material;

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), Rgb([0, 255, 0]));
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), Rgb([0, 0, 255]));
    }

    #[test]
    fn test_hsv_zero_value_is_black() {
        assert_eq!(hsv_to_rgb(206.0, 1.0, 0.0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_hsv_zero_saturation_is_gray() {
        assert_eq!(hsv_to_rgb(77.0, 0.0, 0.5), Rgb([128, 128, 128]));
    }

    #[test]
    fn test_render_dimensions_follow_scale() {
        let grid = Grid::new(12, 7);
        let img = MapRenderer::render_to_image(&grid, 4);
        assert_eq!(img.width(), 48);
        assert_eq!(img.height(), 28);
    }

    #[test]
    fn test_water_renders_blue_dominant() {
        let mut grid = Grid::new(1, 1);
        let cell = grid.get_mut(0, 0);
        cell.material = Material::Water;
        cell.height = 60.0;
        let img = MapRenderer::render_to_image(&grid, 1);
        let Rgb([r, g, b]) = *img.get_pixel(0, 0);
        assert!(b > r && b > g);
    }
}
