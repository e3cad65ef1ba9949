//! Row-band partitioning for parallel rendering.
//!
//! The image is cut into contiguous horizontal bands, one per worker.
//! Each band owns its rows outright, so workers never share output pixels.

/// A contiguous range of image rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// First row of the band
    pub y_start: u32,
    /// One past the last row
    pub y_end: u32,
    /// Position of this band from the top of the image
    pub index: usize,
}

impl Band {
    pub fn new(y_start: u32, y_end: u32, index: usize) -> Self {
        Self {
            y_start,
            y_end,
            index,
        }
    }

    pub fn rows(&self) -> u32 {
        self.y_end - self.y_start
    }

    /// Number of pixels in this band for an image `width` pixels wide.
    pub fn pixel_count(&self, width: u32) -> usize {
        self.rows() as usize * width as usize
    }
}

/// Split `height` rows into `count` bands whose sizes differ by at most one.
///
/// Never produces empty bands: `count` is clamped to the number of rows.
pub fn generate_bands(height: u32, count: usize) -> Vec<Band> {
    let count = count.clamp(1, height.max(1) as usize) as u32;
    if height == 0 {
        return Vec::new();
    }

    let base = height / count;
    let extra = height % count;
    let mut bands = Vec::with_capacity(count as usize);
    let mut y = 0;
    for index in 0..count {
        // The first `extra` bands take one more row
        let rows = base + u32::from(index < extra);
        bands.push(Band::new(y, y + rows, index as usize));
        y += rows;
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(bands: &[Band], height: u32) {
        let mut y = 0;
        for (i, band) in bands.iter().enumerate() {
            assert_eq!(band.index, i);
            assert_eq!(band.y_start, y);
            assert!(band.rows() > 0);
            y = band.y_end;
        }
        assert_eq!(y, height);
    }

    #[test]
    fn test_generate_bands_exact_fit() {
        let bands = generate_bands(120, 4);
        assert_eq!(bands.len(), 4);
        assert!(bands.iter().all(|b| b.rows() == 30));
        assert_covers(&bands, 120);

        let total: usize = bands.iter().map(|b| b.pixel_count(64)).sum();
        assert_eq!(total, 120 * 64);
    }

    #[test]
    fn test_generate_bands_uneven() {
        let bands = generate_bands(10, 3);
        let rows: Vec<u32> = bands.iter().map(Band::rows).collect();
        assert_eq!(rows, vec![4, 3, 3]);
        assert_covers(&bands, 10);
    }

    #[test]
    fn test_more_workers_than_rows() {
        let bands = generate_bands(3, 16);
        assert_eq!(bands.len(), 3);
        assert_covers(&bands, 3);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(generate_bands(0, 4).is_empty());
        let bands = generate_bands(7, 0);
        assert_eq!(bands, vec![Band::new(0, 7, 0)]);
    }

    #[test]
    fn test_band_sizes_balanced() {
        for height in [1u32, 2, 17, 100, 1081] {
            for count in 1..=12 {
                let bands = generate_bands(height, count);
                assert_covers(&bands, height);
                let max = bands.iter().map(Band::rows).max().unwrap();
                let min = bands.iter().map(Band::rows).min().unwrap();
                assert!(max - min <= 1);
            }
        }
    }
}
