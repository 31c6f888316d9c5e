use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.85, 0.55);
            let rgb: Srgb = hsl.into_color();
            Color32::from_rgb(
                (rgb.red * 255.0) as u8,
                (rgb.green * 255.0) as u8,
                (rgb.blue * 255.0) as u8,
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Brush colours: selection value → Color32
// ---------------------------------------------------------------------------

/// Colour of unselected points and of each brush.
#[derive(Debug, Clone)]
pub struct BrushPalette {
    brushes: Vec<Color32>,
    pub unselected: Color32,
}

impl BrushPalette {
    pub fn new(nbrushes: usize) -> Self {
        Self {
            brushes: generate_palette(nbrushes),
            unselected: Color32::from_gray(160),
        }
    }

    pub fn brush(&self, brush: usize) -> Color32 {
        self.brushes.get(brush).copied().unwrap_or(Color32::RED)
    }

    /// Colour for a per-point selection value (0 = unselected, else brush+1).
    pub fn color_for(&self, selected: u32) -> Color32 {
        match selected {
            0 => self.unselected,
            s => self.brush(s as usize - 1),
        }
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brushes_are_distinct() {
        let p = BrushPalette::new(4);
        assert_eq!(p.len(), 4);
        assert_ne!(p.brush(0), p.brush(1));
        assert_eq!(p.color_for(0), p.unselected);
        assert_eq!(p.color_for(2), p.brush(1));
    }
}
