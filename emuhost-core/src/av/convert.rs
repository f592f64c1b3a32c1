/// Expand little-endian RGB565 pixels to packed RGB888.
///
/// Channels are widened by bit replication so pure white stays 0xFF.
pub fn rgb565_to_rgb888(src: &[u8]) -> Vec<u8> {
    src.chunks_exact(2)
        .flat_map(|px| {
            let v = u16::from_le_bytes([px[0], px[1]]);
            let r = ((v >> 11) & 0x1F) as u8;
            let g = ((v >> 5) & 0x3F) as u8;
            let b = (v & 0x1F) as u8;
            [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
        })
        .collect()
}

/// Pack an RGB888 color into a little-endian RGB565 pixel.
pub fn rgb888_to_rgb565(r: u8, g: u8, b: u8) -> [u8; 2] {
    let v = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
    v.to_le_bytes()
}
